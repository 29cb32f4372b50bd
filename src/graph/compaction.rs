use super::node::TxNode;
use super::UnconfTxGraph;
use crate::parsing::transaction_structs::{Transaction, TransactionContext, TxIn, TxMeta, TxOut};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

// Longest parent-to-leaf chain this module will fold in one pass. Mempool
// chain policy keeps honest chains far below this; anything deeper is
// suspect input and is left alone.
pub const MAX_CHAIN_DEPTH: usize = 25;

pub(crate) struct CompactOutcome {
    // the synthetic unsigned transaction standing in for the folded chain
    pub context: TransactionContext,
    // every original transaction the synthetic one supersedes, the folded
    // node's own prior self first
    pub replaced: Vec<Transaction>,
}

// Attempts to fold the sub-chain rooted at `root` (the node itself plus all
// of its descendants) into a single synthetic transaction. All or nothing:
// if any transaction in the sub-chain is not ours, lacks a change script or
// the chain is deeper than MAX_CHAIN_DEPTH, the whole attempt is abandoned
// and None is returned.
pub(crate) fn compact_chain(graph: &UnconfTxGraph, root: &str) -> Option<CompactOutcome> {
    let depth = chain_depth(graph, root);
    if depth > MAX_CHAIN_DEPTH {
        warn!("chain below {root} is {depth} transactions deep, refusing to compact");
        return None;
    }

    // explicit post-order walk, children are merged before their parent
    let mut outcomes: HashMap<String, CompactOutcome> = HashMap::new();
    let mut stack: Vec<(String, bool)> = vec![(root.to_string(), false)];

    while let Some((txid, visited)) = stack.pop() {
        let node = graph.get(&txid)?;
        if !node.is_compactable() {
            debug!("transaction {txid} is not ours or has no change script, chain stays as is");
            return None;
        }
        if visited {
            if !outcomes.contains_key(&txid) {
                let outcome = merge_with_children(node, &outcomes);
                outcomes.insert(txid, outcome);
            }
        } else {
            stack.push((txid.clone(), true));
            for child in &node.children {
                if !outcomes.contains_key(child) {
                    stack.push((child.clone(), false));
                }
            }
        }
    }

    outcomes.remove(root)
}

// Builds the merged transaction for one node out of its already-merged
// children. A leaf folds to a structural clone of itself so it can always
// take part in a parent's merge.
fn merge_with_children(node: &TxNode, outcomes: &HashMap<String, CompactOutcome>) -> CompactOutcome {
    let context = &node.context;
    if node.children.is_empty() {
        return CompactOutcome {
            context: context.clone(),
            replaced: vec![context.transaction.clone()],
        };
    }

    let change_script = context
        .change_script
        .as_deref()
        .expect("compactable node always has a change script");
    let own_txid = node.txid();

    // deterministic merge order regardless of edge set iteration
    let mut child_ids: Vec<&String> = node.children.iter().collect();
    child_ids.sort();
    let children: Vec<&CompactOutcome> = child_ids
        .iter()
        .map(|child| {
            outcomes
                .get(*child)
                .expect("children are merged before their parent")
        })
        .collect();

    // children's inputs minus the ones spending this node; the outputs
    // those inputs pointed at are internalized and disappear
    let mut inputs: Vec<TxIn> = Vec::new();
    let mut seen_outpoints: HashSet<(String, u32)> = HashSet::new();
    let mut internalized: HashSet<u32> = HashSet::new();
    for child in &children {
        for input in &child.context.transaction.vin {
            if input.txid == own_txid {
                internalized.insert(input.vout);
                continue;
            }
            if seen_outpoints.insert((input.txid.clone(), input.vout)) {
                inputs.push(input.clone());
            }
        }
    }
    for input in &context.transaction.vin {
        if seen_outpoints.insert((input.txid.clone(), input.vout)) {
            inputs.push(input.clone());
        }
    }

    // children's outputs minus each child's own change output, that value
    // folds upward into the surviving change
    let mut outputs: Vec<TxOut> = Vec::new();
    for child in &children {
        let child_change = child.context.change_script.as_deref();
        let mut change_skipped = false;
        for output in &child.context.transaction.vout {
            if !change_skipped && output.scriptpubkey.as_deref() == child_change {
                change_skipped = true;
                continue;
            }
            outputs.push(output.clone());
        }
    }
    // then our own outputs: internalized ones disappear, the change output
    // always survives as the fold anchor
    let mut change_index: Option<usize> = None;
    for (vout, output) in context.transaction.vout.iter().enumerate() {
        if change_index.is_none() && output.scriptpubkey.as_deref() == Some(change_script) {
            change_index = Some(outputs.len());
            outputs.push(output.clone());
            continue;
        }
        if internalized.contains(&(vout as u32)) {
            continue;
        }
        outputs.push(output.clone());
    }
    let change_index = match change_index {
        Some(index) => index,
        None => panic!("change output {change_script} missing while merging chain at {own_txid}"),
    };

    // the merged transaction pays the folded chain's combined fee
    let mut fee = context.fee;
    for child in &children {
        fee += child.context.fee;
    }

    // absorbed change and absorbed fees both land in the surviving change
    // output; deriving its value from the input surplus keeps the merged
    // transaction value-conserving by construction
    let input_value: u64 = inputs.iter().map(|input| input.prevout.value).sum();
    let other_outputs: u64 = outputs
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != change_index)
        .map(|(_, output)| output.value)
        .sum();
    let change_value = match input_value.checked_sub(fee + other_outputs) {
        Some(value) => value,
        None => panic!(
            "value conservation violated merging chain at {own_txid}: \
             inputs {input_value} cannot cover fee {fee} plus outputs {other_outputs}"
        ),
    };
    outputs[change_index].value = change_value;

    let mut transaction = Transaction {
        meta: TxMeta::default(),
        version: context.transaction.version,
        locktime: context.transaction.locktime,
        vin: inputs,
        vout: outputs,
    };
    // unsigned on purpose, the wallet re-signs before broadcast
    transaction.strip_signatures();
    transaction.compute_ids();

    let mut replaced = vec![context.transaction.clone()];
    let mut replaced_ids: HashSet<String> = HashSet::from([own_txid.to_string()]);
    for child in &children {
        for tx in &child.replaced {
            if replaced_ids.insert(tx.meta.txid_hex.clone()) {
                replaced.push(tx.clone());
            }
        }
    }

    CompactOutcome {
        context: TransactionContext {
            transaction,
            fee,
            change_script: Some(change_script.to_string()),
            is_mine: true,
        },
        replaced,
    }
}

// longest parent-to-leaf path in the sub-chain rooted at `root`
fn chain_depth(graph: &UnconfTxGraph, root: &str) -> usize {
    let mut depths: HashMap<String, usize> = HashMap::new();
    let mut stack: Vec<(String, bool)> = vec![(root.to_string(), false)];

    while let Some((txid, visited)) = stack.pop() {
        let node = match graph.get(&txid) {
            Some(node) => node,
            None => continue,
        };
        if visited {
            let deepest = node
                .children
                .iter()
                .filter_map(|child| depths.get(child))
                .max()
                .copied()
                .unwrap_or(0);
            depths.insert(txid, deepest + 1);
        } else if !depths.contains_key(&txid) {
            stack.push((txid.clone(), true));
            for child in &node.children {
                if !depths.contains_key(child) {
                    stack.push((child.clone(), false));
                }
            }
        }
    }

    depths.get(root).copied().unwrap_or(0)
}
