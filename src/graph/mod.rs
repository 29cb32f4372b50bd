mod compaction;
mod node;
mod replacements;

pub use compaction::MAX_CHAIN_DEPTH;
pub use node::TxNode;
pub use replacements::{Replacement, Replacements};

use crate::error::GraphError;
use crate::parsing::transaction_structs::TransactionContext;
use log::debug;
use std::collections::{HashMap, HashSet};

// Directed acyclic graph of unconfirmed transactions. An edge parent->child
// exists when an input of the child spends an output of the parent. The
// graph owns its nodes; edges are txid key sets, so cloning is a plain
// structural copy and a compaction attempt can work on a private clone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnconfTxGraph {
    nodes_by_hash: HashMap<String, TxNode>,
    root_nodes: HashSet<String>,
    leaf_nodes: HashSet<String>,
}

impl UnconfTxGraph {
    // builds the graph from the caller-supplied set of unconfirmed
    // transactions: hashes every transaction once, then links parent/child
    // edges from input-to-output references within the tracked set
    pub fn build(contexts: Vec<TransactionContext>) -> Result<Self, GraphError> {
        let mut nodes_by_hash = HashMap::with_capacity(contexts.len());
        for mut context in contexts {
            if context.transaction.meta.txid_hex.is_empty() {
                context.transaction.compute_ids();
            }
            let txid = context.txid().to_string();
            if context.transaction.vin.is_empty() || context.transaction.vout.is_empty() {
                return Err(GraphError::EmptyTransaction { txid });
            }
            if nodes_by_hash.contains_key(&txid) {
                return Err(GraphError::DuplicateTx { txid });
            }
            nodes_by_hash.insert(txid, TxNode::new(context));
        }
        let mut graph = UnconfTxGraph {
            nodes_by_hash,
            root_nodes: HashSet::new(),
            leaf_nodes: HashSet::new(),
        };
        graph.link_parents();
        graph.txs_updated();
        Ok(graph)
    }

    // searches the tracked set for outpoints referenced by transaction
    // inputs and records the spend relationship as a two-way edge
    fn link_parents(&mut self) {
        let mut edges: Vec<(String, String)> = Vec::new();
        for (txid, node) in &self.nodes_by_hash {
            for input in &node.context.transaction.vin {
                if self.nodes_by_hash.contains_key(&input.txid) {
                    edges.push((input.txid.clone(), txid.clone()));
                }
            }
        }
        for (parent, child) in edges {
            if let Some(node) = self.nodes_by_hash.get_mut(&child) {
                node.parents.insert(parent.clone());
            }
            if let Some(node) = self.nodes_by_hash.get_mut(&parent) {
                node.children.insert(child);
            }
        }
    }

    // recomputes everything derived from the edge set: root and leaf sets
    // plus every node's ancestor package sums. Two passes, first walking
    // the ancestor sets against the immutable graph and then storing the
    // results, so no memoization happens mid-walk.
    pub fn txs_updated(&mut self) {
        self.root_nodes = self
            .nodes_by_hash
            .iter()
            .filter(|(_, node)| node.parents.is_empty())
            .map(|(txid, _)| txid.clone())
            .collect();
        self.leaf_nodes = self
            .nodes_by_hash
            .iter()
            .filter(|(_, node)| node.children.is_empty())
            .map(|(txid, _)| txid.clone())
            .collect();

        let mut packages: Vec<(String, u64, u64)> = Vec::with_capacity(self.nodes_by_hash.len());
        for (txid, node) in &self.nodes_by_hash {
            let mut fee = node.fee();
            let mut size = node.vsize();
            // set semantics: an ancestor shared via two paths counts once
            for ancestor in self.calc_ancestors(txid) {
                if let Some(ancestor_node) = self.nodes_by_hash.get(&ancestor) {
                    fee += ancestor_node.fee();
                    size += ancestor_node.vsize();
                }
            }
            packages.push((txid.clone(), fee, size));
        }
        for (txid, fee, size) in packages {
            if let Some(node) = self.nodes_by_hash.get_mut(&txid) {
                node.ancestor_fee = fee;
                node.ancestor_size = size;
            }
        }
    }

    // transitive closure over parent edges, iterative worklist
    pub fn calc_ancestors(&self, txid: &str) -> HashSet<String> {
        let mut ancestors: HashSet<String> = HashSet::new();
        let mut stage: Vec<String> = match self.nodes_by_hash.get(txid) {
            Some(node) => node.parents.iter().cloned().collect(),
            None => return ancestors,
        };
        while let Some(current) = stage.pop() {
            if !ancestors.insert(current.clone()) {
                continue;
            }
            if let Some(node) = self.nodes_by_hash.get(&current) {
                for parent in &node.parents {
                    if !ancestors.contains(parent) {
                        stage.push(parent.clone());
                    }
                }
            }
        }
        ancestors
    }

    // transitive closure over child edges, iterative worklist
    pub fn calc_descendants(&self, txid: &str) -> HashSet<String> {
        let mut descendants: HashSet<String> = HashSet::new();
        let mut stage: Vec<String> = match self.nodes_by_hash.get(txid) {
            Some(node) => node.children.iter().cloned().collect(),
            None => return descendants,
        };
        while let Some(current) = stage.pop() {
            if !descendants.insert(current.clone()) {
                continue;
            }
            if let Some(node) = self.nodes_by_hash.get(&current) {
                for child in &node.children {
                    if !descendants.contains(child) {
                        stage.push(child.clone());
                    }
                }
            }
        }
        descendants
    }

    // prunes parent/child references to transactions that are no longer
    // tracked, the graph must never contain dangling edges
    pub fn cleanup_hierarchy(&mut self) {
        let live: HashSet<String> = self.nodes_by_hash.keys().cloned().collect();
        for node in self.nodes_by_hash.values_mut() {
            node.parents.retain(|txid| live.contains(txid));
            node.children.retain(|txid| live.contains(txid));
        }
    }

    // Attempts to collapse the chain below each requested transaction into
    // one synthetic replacement. Works on a clone, the receiver is never
    // touched. Best effort per target: a target that is missing (e.g.
    // already absorbed by an earlier merge) or not compactable is skipped
    // and never aborts the remaining targets.
    pub fn compact(&self, target_hashes: &[String]) -> (UnconfTxGraph, Replacements) {
        let mut updated = self.clone();
        let mut replacements = Replacements::new(self.nodes_by_hash.keys().cloned().collect());

        for target in target_hashes {
            if !updated.nodes_by_hash.contains_key(target) {
                debug!("compaction target {target} not in graph, skipping");
                continue;
            }
            let outcome = match compaction::compact_chain(&updated, target) {
                Some(outcome) => outcome,
                None => {
                    debug!("chain below {target} is not compactable, skipping");
                    continue;
                }
            };
            updated.apply_outcome(&outcome);
            replacements.push(Replacement {
                new_tx: outcome.context,
                replaced: outcome.replaced,
            });
        }
        updated.txs_updated();
        (updated, replacements)
    }

    // swaps a folded chain for its synthetic replacement: drops the
    // replaced nodes, inserts the new one, links it to surviving parents
    // through its inputs and prunes every stale edge
    fn apply_outcome(&mut self, outcome: &compaction::CompactOutcome) {
        for replaced_tx in &outcome.replaced {
            self.nodes_by_hash.remove(&replaced_tx.meta.txid_hex);
        }
        let mut node = TxNode::new(outcome.context.clone());
        let new_txid = node.txid().to_string();
        for input in &outcome.context.transaction.vin {
            if self.nodes_by_hash.contains_key(&input.txid) {
                node.parents.insert(input.txid.clone());
            }
        }
        for parent in &node.parents {
            if let Some(parent_node) = self.nodes_by_hash.get_mut(parent) {
                parent_node.children.insert(new_txid.clone());
            }
        }
        self.nodes_by_hash.insert(new_txid, node);
        self.cleanup_hierarchy();
    }

    pub fn get(&self, txid: &str) -> Option<&TxNode> {
        self.nodes_by_hash.get(txid)
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.nodes_by_hash.contains_key(txid)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TxNode> {
        self.nodes_by_hash.values()
    }

    pub fn len(&self) -> usize {
        self.nodes_by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes_by_hash.is_empty()
    }

    // transactions whose inputs all reference untracked (e.g. confirmed)
    // outputs
    pub fn roots(&self) -> &HashSet<String> {
        &self.root_nodes
    }

    pub fn leaves(&self) -> &HashSet<String> {
        &self.leaf_nodes
    }

    // sum of all tracked fees; conserved by compaction
    pub fn total_fee(&self) -> u64 {
        self.nodes_by_hash.values().map(|node| node.fee()).sum()
    }
}
