use crate::parsing::transaction_structs::TransactionContext;
use std::collections::HashSet;

// One transaction inside the dependency graph. Edges are stored as sets of
// txid keys into the owning graph's node map, never as direct references,
// so cloning a graph is a plain structural copy.
#[derive(Debug, Clone, PartialEq)]
pub struct TxNode {
    pub context: TransactionContext,
    pub parents: HashSet<String>,
    pub children: HashSet<String>,
    // ancestor package sums, recomputed by UnconfTxGraph::txs_updated()
    // whenever the edge set changes
    pub ancestor_fee: u64,
    pub ancestor_size: u64,
}

impl TxNode {
    pub fn new(context: TransactionContext) -> Self {
        let fee = context.fee;
        let vsize = context.transaction.meta.vsize;
        TxNode {
            context,
            parents: HashSet::new(),
            children: HashSet::new(),
            // a node with no parents is its own package
            ancestor_fee: fee,
            ancestor_size: vsize,
        }
    }

    pub fn txid(&self) -> &str {
        self.context.txid()
    }

    pub fn fee(&self) -> u64 {
        self.context.fee
    }

    pub fn vsize(&self) -> u64 {
        self.context.transaction.meta.vsize
    }

    // a transaction may only be rewritten if the wallet owns it and knows
    // which of its outputs is the change
    pub fn is_compactable(&self) -> bool {
        self.context.is_mine && self.context.change_script.is_some()
    }

    // package (ancestor inclusive) fee rate in sat/vbyte:
    // (own_fee + ancestor fees) / (own_vsize + ancestor vsizes)
    pub fn effective_fee_rate(&self) -> f64 {
        self.ancestor_fee as f64 / self.ancestor_size as f64
    }
}
