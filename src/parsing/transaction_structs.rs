// Definition of data structures to hold a bitcoin transaction and the
// fee/ownership metadata the dependency graph tracks alongside it

use crate::serialization::compute_ids;
use serde::Deserialize;
use serde_with::{serde_as, NoneAsEmptyString};

#[serde_as]
#[derive(Deserialize, Debug, PartialEq, Clone)]
pub struct TxOut {
    #[serde_as(as = "NoneAsEmptyString")]
    pub scriptpubkey: Option<String>,
    pub value: u64,
}

// the output being spent by a TxIn, carried inline so input values are
// known without a UTXO lookup
#[derive(Deserialize, Debug, PartialEq, Clone)]
pub struct Script {
    pub scriptpubkey: String,
    pub value: u64,
}

#[serde_as]
#[derive(Deserialize, Debug, PartialEq, Clone)]
pub struct TxIn {
    pub txid: String,
    pub vout: u32,
    #[serde_as(as = "NoneAsEmptyString")]
    pub scriptsig: Option<String>,
    pub prevout: Script,
    pub witness: Option<Vec<String>>,
    pub sequence: u32,
}

#[derive(Default, Debug, PartialEq, Clone)]
pub struct TxMeta {
    pub txid_hex: String,
    pub wtxid_hex: String,
    pub vsize: u64,
}

// main Transaction struct; meta is filled in by compute_ids() after parsing
#[derive(Deserialize, Debug, PartialEq, Clone)]
pub struct Transaction {
    #[serde(skip_deserializing)]
    pub meta: TxMeta,
    pub version: i32,
    pub locktime: u32,
    pub vin: Vec<TxIn>,
    pub vout: Vec<TxOut>,
}

impl Transaction {
    // hashes the transaction once and caches txid, wtxid and vsize in meta
    pub fn compute_ids(&mut self) {
        compute_ids(self);
    }

    // sum of all input values taken from the inlined prevouts
    pub fn input_value(&self) -> u64 {
        self.vin.iter().map(|txin| txin.prevout.value).sum()
    }

    // sum of all output values
    pub fn output_value(&self) -> u64 {
        self.vout.iter().map(|txout| txout.value).sum()
    }

    // removes scriptsigs and witnesses from every input; the resulting
    // transaction is unsigned and the wallet must re-sign before broadcast
    pub fn strip_signatures(&mut self) {
        for txin in &mut self.vin {
            txin.scriptsig = None;
            txin.witness = None;
        }
    }
}

// Everything the graph needs to know about one unconfirmed transaction.
// Supplied by the external mempool/wallet watcher and never mutated: the
// parsed transaction, its absolute fee in satoshi, the scriptpubkey of its
// change output (if any) and whether the wallet controls the keys and may
// rewrite the transaction.
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionContext {
    pub transaction: Transaction,
    pub fee: u64,
    pub change_script: Option<String>,
    pub is_mine: bool,
}

impl TransactionContext {
    pub fn new(
        mut transaction: Transaction,
        fee: u64,
        change_script: Option<String>,
        is_mine: bool,
    ) -> Self {
        transaction.compute_ids();
        TransactionContext {
            transaction,
            fee,
            change_script,
            is_mine,
        }
    }

    pub fn txid(&self) -> &str {
        &self.transaction.meta.txid_hex
    }
}

// Sample input document (esplora format), as supplied by the mempool watcher:
//
// # {
//     #   "version": 2,
//     #   "locktime": 0,
//     #   "vin": [
//     #     {
//     #       "txid": "3b7dc918e5671037effad7848727da3d3bf302b05f5ded9bec89449460473bbb",
//     #       "vout": 16,
//     #       "prevout": {
//     #         "scriptpubkey": "0014f8d9f2203c6f0773983392a487d45c0c818f9573",
//     #         "value": 37079526
//     #       },
//     #       "scriptsig": "",
//     #       "witness": [
//     #         "30440220780ad409b4d13eb1882aaf2e7a53a206734aa302279d6859e254a7f0a7633556022011fd0cbdf5d4374513ef60f850b7059c6a093ab9e46beb002505b7cba0623cf301",
//     #         "022bf8c45da789f695d59f93983c813ec205203056e19ec5d3fbefa809af67e2ec"
//     #       ],
//     #       "sequence": 4294967293
//     #     }
//     #   ],
//     #   "vout": [
//     #     {
//     #       "scriptpubkey": "0014ad4cc1cc859c57477bf90d0f944360d90a3998bf",
//     #       "value": 36977942
//     #     }
//     #   ]
//     # }
