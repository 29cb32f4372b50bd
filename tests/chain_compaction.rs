// End-to-end exercise of the unconfirmed-transaction graph: build a chain
// of owned change-spending transactions, compact it and check the
// conservation laws on the resulting replacement ledger.

use bitcoin_chain_compactor::parsing::transaction_structs::{Script, TxIn, TxMeta, TxOut};
use bitcoin_chain_compactor::{Replacement, Transaction, TransactionContext, UnconfTxGraph};
use std::collections::{HashMap, HashSet};

const CHANGE: &str = "0014cccccccccccccccccccccccccccccccccccccccc";
const PAYEE: &str = "0014dddddddddddddddddddddddddddddddddddddddd";
const FUNDING_SCRIPT: &str = "0014aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

fn make_tx(inputs: &[(&str, u32, u64, &str)], outputs: &[(&str, u64)]) -> Transaction {
    let vin = inputs
        .iter()
        .map(|(txid, vout, value, script)| TxIn {
            txid: txid.to_string(),
            vout: *vout,
            scriptsig: Some("deadbeef".to_string()),
            prevout: Script {
                scriptpubkey: script.to_string(),
                value: *value,
            },
            witness: Some(vec!["aa".to_string()]),
            sequence: 0xfffffffd,
        })
        .collect();
    let vout = outputs
        .iter()
        .map(|(script, value)| TxOut {
            scriptpubkey: Some(script.to_string()),
            value: *value,
        })
        .collect();
    let mut tx = Transaction {
        meta: TxMeta::default(),
        version: 2,
        locktime: 0,
        vin,
        vout,
    };
    tx.compute_ids();
    tx
}

fn owned(tx: Transaction, fee: u64) -> TransactionContext {
    TransactionContext::new(tx, fee, Some(CHANGE.to_string()), true)
}

// checks both conservation laws on one ledger entry:
//   synthetic.fee == sum of replaced fees
//   synthetic outputs + synthetic fee == replaced outputs not internally
//   consumed + replaced fees
fn assert_conserved(replacement: &Replacement, fee_by_txid: &HashMap<String, u64>) {
    let replaced_ids: HashSet<&str> = replacement
        .replaced
        .iter()
        .map(|tx| tx.meta.txid_hex.as_str())
        .collect();
    let spent_within: HashSet<(String, u32)> = replacement
        .replaced
        .iter()
        .flat_map(|tx| tx.vin.iter())
        .filter(|input| replaced_ids.contains(input.txid.as_str()))
        .map(|input| (input.txid.clone(), input.vout))
        .collect();
    let surviving_outputs: u64 = replacement
        .replaced
        .iter()
        .flat_map(|tx| {
            let txid = tx.meta.txid_hex.clone();
            let spent_within = &spent_within;
            tx.vout
                .iter()
                .enumerate()
                .filter(move |(vout, _)| !spent_within.contains(&(txid.clone(), *vout as u32)))
                .map(|(_, output)| output.value)
        })
        .sum();
    let replaced_fees: u64 = replacement
        .replaced
        .iter()
        .map(|tx| fee_by_txid[&tx.meta.txid_hex])
        .sum();

    assert_eq!(replacement.new_tx.fee, replaced_fees, "fee conservation");
    assert_eq!(
        replacement.new_tx.transaction.output_value() + replacement.new_tx.fee,
        surviving_outputs + replaced_fees,
        "value conservation"
    );
}

#[test]
fn three_transaction_chain_end_to_end() {
    // Tx1: fee 1000, pays 4000, change 5000. Tx2 spends the change, fee
    // 500, change 4500. Tx3 spends that, fee 300, change 4200.
    let tx1 = make_tx(
        &[(&"99".repeat(32), 0, 10000, FUNDING_SCRIPT)],
        &[(PAYEE, 4000), (CHANGE, 5000)],
    );
    let tx2 = make_tx(&[(&tx1.meta.txid_hex, 1, 5000, CHANGE)], &[(CHANGE, 4500)]);
    let tx3 = make_tx(&[(&tx2.meta.txid_hex, 0, 4500, CHANGE)], &[(CHANGE, 4200)]);
    let [id1, id2, id3] = [
        tx1.meta.txid_hex.clone(),
        tx2.meta.txid_hex.clone(),
        tx3.meta.txid_hex.clone(),
    ];
    let fee_by_txid: HashMap<String, u64> =
        HashMap::from([(id1.clone(), 1000), (id2.clone(), 500), (id3.clone(), 300)]);

    let graph = UnconfTxGraph::build(vec![
        owned(tx1, 1000),
        owned(tx2, 500),
        owned(tx3, 300),
    ])
    .unwrap();

    // package fee rate at the tip covers the whole chain
    let tip = graph.get(&id3).unwrap();
    assert_eq!(tip.ancestor_fee, 1800);
    let chain_size: u64 = graph.nodes().map(|node| node.vsize()).sum();
    assert_eq!(tip.ancestor_size, chain_size);
    assert!((tip.effective_fee_rate() - 1800.0 / chain_size as f64).abs() < 1e-9);

    let (updated, replacements) = graph.compact(&[id2.clone()]);

    assert_eq!(replacements.len(), 1);
    let replacement = &replacements.entries()[0];
    assert_conserved(replacement, &fee_by_txid);

    // one synthetic transaction spending Tx1's change with the combined fee
    let synthetic = &replacement.new_tx;
    assert_eq!(synthetic.fee, 800);
    assert_eq!(synthetic.transaction.vin.len(), 1);
    assert_eq!(synthetic.transaction.vin[0].txid, id1);
    assert_eq!(synthetic.transaction.vout.len(), 1);
    assert_eq!(synthetic.transaction.vout[0].value, 4200);
    let replaced_ids: Vec<&str> = replacement
        .replaced
        .iter()
        .map(|tx| tx.meta.txid_hex.as_str())
        .collect();
    assert_eq!(replaced_ids, vec![id2.as_str(), id3.as_str()]);

    // graph-level fee total is untouched by the merge
    assert_eq!(updated.total_fee(), graph.total_fee());
    // untouched root context is bit identical
    assert_eq!(
        updated.get(&id1).unwrap().context,
        graph.get(&id1).unwrap().context
    );
    // and the source graph itself still tracks all three transactions
    assert_eq!(graph.len(), 3);
}

#[test]
fn chained_targets_strip_down_to_originals() {
    let tx1 = make_tx(
        &[(&"99".repeat(32), 0, 10000, FUNDING_SCRIPT)],
        &[(PAYEE, 4000), (CHANGE, 5000)],
    );
    let tx2 = make_tx(&[(&tx1.meta.txid_hex, 1, 5000, CHANGE)], &[(CHANGE, 4500)]);
    let tx3 = make_tx(&[(&tx2.meta.txid_hex, 0, 4500, CHANGE)], &[(CHANGE, 4200)]);
    let [id1, id2, id3] = [
        tx1.meta.txid_hex.clone(),
        tx2.meta.txid_hex.clone(),
        tx3.meta.txid_hex.clone(),
    ];
    let fee_by_txid: HashMap<String, u64> =
        HashMap::from([(id1.clone(), 1000), (id2.clone(), 500), (id3.clone(), 300)]);

    let graph = UnconfTxGraph::build(vec![
        owned(tx1, 1000),
        owned(tx2, 500),
        owned(tx3, 300),
    ])
    .unwrap();

    // the second target folds Tx1 together with the synthetic product of
    // the first merge
    let (updated, mut replacements) = graph.compact(&[id2.clone(), id1.clone()]);
    assert_eq!(replacements.len(), 2);

    replacements.strip_intermediate();

    assert_eq!(replacements.len(), 1);
    let replacement = &replacements.entries()[0];
    // no synthetic hash leaks to the external ledger
    for tx in &replacement.replaced {
        assert!(
            graph.contains(&tx.meta.txid_hex),
            "{} is not an originally observed transaction",
            tx.meta.txid_hex
        );
    }
    let replaced_ids: HashSet<&str> = replacement
        .replaced
        .iter()
        .map(|tx| tx.meta.txid_hex.as_str())
        .collect();
    assert_eq!(
        replaced_ids,
        HashSet::from([id1.as_str(), id2.as_str(), id3.as_str()])
    );
    assert_conserved(replacement, &fee_by_txid);

    assert_eq!(updated.len(), 1);
    assert_eq!(updated.total_fee(), 1800);
}

#[test]
fn payments_survive_the_fold() {
    // both transactions also pay third parties and the child brings in an
    // extra external input
    let tx1 = make_tx(
        &[(&"88".repeat(32), 0, 50000, FUNDING_SCRIPT)],
        &[(PAYEE, 10000), (CHANGE, 35000)],
    );
    let tx2 = make_tx(
        &[
            (&tx1.meta.txid_hex, 1, 35000, CHANGE),
            (&"77".repeat(32), 3, 8000, FUNDING_SCRIPT),
        ],
        &[(PAYEE, 20000), (CHANGE, 21500)],
    );
    let [id1, id2] = [tx1.meta.txid_hex.clone(), tx2.meta.txid_hex.clone()];
    let fee_by_txid: HashMap<String, u64> =
        HashMap::from([(id1.clone(), 5000), (id2.clone(), 1500)]);

    let graph = UnconfTxGraph::build(vec![owned(tx1, 5000), owned(tx2, 1500)]).unwrap();
    let (updated, replacements) = graph.compact(&[id1.clone()]);

    assert_eq!(replacements.len(), 1);
    let replacement = &replacements.entries()[0];
    assert_conserved(replacement, &fee_by_txid);

    let synthetic = &replacement.new_tx;
    assert_eq!(synthetic.fee, 6500);
    // both funding inputs survive, the internal hop is gone
    let input_ids: HashSet<&str> = synthetic
        .transaction
        .vin
        .iter()
        .map(|input| input.txid.as_str())
        .collect();
    assert!(!input_ids.contains(id1.as_str()));
    assert_eq!(synthetic.transaction.vin.len(), 2);
    // both third-party payments survive and the change absorbs the rest:
    // 58000 in - 6500 fee - 30000 payments = 21500
    let change_value = synthetic
        .transaction
        .vout
        .iter()
        .find(|output| output.scriptpubkey.as_deref() == Some(CHANGE))
        .map(|output| output.value);
    assert_eq!(change_value, Some(21500));
    assert_eq!(synthetic.transaction.output_value(), 51500);

    assert_eq!(updated.len(), 1);
    assert_eq!(updated.total_fee(), 6500);
}
