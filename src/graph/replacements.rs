use crate::parsing::transaction_structs::{Transaction, TransactionContext};
use std::collections::{HashMap, HashSet};

// One synthetic transaction standing in for the original transactions it
// supersedes. The external wallet/mempool trackers use this to mark the
// originals as replaced once the synthetic transaction is signed and
// broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
    pub new_tx: TransactionContext,
    pub replaced: Vec<Transaction>,
}

impl Replacement {
    pub fn txid(&self) -> &str {
        self.new_tx.txid()
    }
}

// Ordered ledger of the replacements produced by one compaction run,
// together with the txid set of the pre-compaction graph. The set is what
// tells genuinely observed transactions apart from synthetic intermediates
// created earlier in the same run.
#[derive(Debug, Clone, PartialEq)]
pub struct Replacements {
    entries: Vec<Replacement>,
    original_txids: HashSet<String>,
}

impl Replacements {
    pub(crate) fn new(original_txids: HashSet<String>) -> Self {
        Replacements {
            entries: Vec::new(),
            original_txids,
        }
    }

    pub(crate) fn push(&mut self, replacement: Replacement) {
        self.entries.push(replacement);
    }

    pub fn entries(&self) -> &[Replacement] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Replacement> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Rewrites the ledger so only originally observed transactions remain.
    // A chained compaction run can replace a synthetic product of an
    // earlier merge in the same run; such intermediates were never
    // broadcast and must not leak to external trackers. Every replaced
    // list is expanded down to original transactions and entries whose
    // synthetic transaction was itself absorbed later are dropped.
    pub fn strip_intermediate(&mut self) {
        let mut expanded: HashMap<String, Vec<Transaction>> = HashMap::new();
        let mut superseded: HashSet<String> = HashSet::new();

        // an intermediate can only have been produced by an earlier entry,
        // so one forward pass sees every substitution it needs
        for entry in &self.entries {
            let mut flat: Vec<Transaction> = Vec::new();
            for tx in &entry.replaced {
                let txid = &tx.meta.txid_hex;
                if self.original_txids.contains(txid) {
                    flat.push(tx.clone());
                } else {
                    superseded.insert(txid.clone());
                    match expanded.get(txid) {
                        Some(originals) => flat.extend(originals.iter().cloned()),
                        None => panic!("replacement ledger references unknown intermediate {txid}"),
                    }
                }
            }
            expanded.insert(entry.txid().to_string(), flat);
        }

        self.entries.retain(|entry| !superseded.contains(entry.txid()));
        for entry in &mut self.entries {
            if let Some(flat) = expanded.remove(entry.txid()) {
                entry.replaced = flat;
            }
        }
    }
}

impl<'a> IntoIterator for &'a Replacements {
    type Item = &'a Replacement;
    type IntoIter = std::slice::Iter<'a, Replacement>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::transaction_structs::TxMeta;

    fn stub_tx(txid: &str) -> Transaction {
        Transaction {
            meta: TxMeta {
                txid_hex: txid.to_string(),
                wtxid_hex: txid.to_string(),
                vsize: 100,
            },
            version: 2,
            locktime: 0,
            vin: Vec::new(),
            vout: Vec::new(),
        }
    }

    fn stub_context(txid: &str, fee: u64) -> TransactionContext {
        TransactionContext {
            transaction: stub_tx(txid),
            fee,
            change_script: Some("00".to_string()),
            is_mine: true,
        }
    }

    #[test]
    fn stripping_expands_intermediates_and_drops_superseded_entries() {
        // run over originals {a, b, c}: first merge folds b+c into s1,
        // second merge folds a+s1 into s2
        let mut ledger = Replacements::new(HashSet::from([
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
        ]));
        ledger.push(Replacement {
            new_tx: stub_context("s1", 800),
            replaced: vec![stub_tx("b"), stub_tx("c")],
        });
        ledger.push(Replacement {
            new_tx: stub_context("s2", 1800),
            replaced: vec![stub_tx("a"), stub_tx("s1")],
        });

        ledger.strip_intermediate();

        assert_eq!(ledger.len(), 1);
        let entry = &ledger.entries()[0];
        assert_eq!(entry.txid(), "s2");
        let replaced: Vec<&str> = entry
            .replaced
            .iter()
            .map(|tx| tx.meta.txid_hex.as_str())
            .collect();
        assert_eq!(replaced, vec!["a", "b", "c"]);
    }

    #[test]
    fn stripping_keeps_independent_entries() {
        let mut ledger =
            Replacements::new(HashSet::from(["a".to_string(), "b".to_string()]));
        ledger.push(Replacement {
            new_tx: stub_context("s1", 100),
            replaced: vec![stub_tx("a")],
        });
        ledger.push(Replacement {
            new_tx: stub_context("s2", 200),
            replaced: vec![stub_tx("b")],
        });

        let before = ledger.clone();
        ledger.strip_intermediate();
        assert_eq!(ledger, before);
    }

    #[test]
    #[should_panic(expected = "unknown intermediate")]
    fn unknown_intermediate_is_a_fatal_invariant() {
        let mut ledger = Replacements::new(HashSet::from(["a".to_string()]));
        ledger.push(Replacement {
            new_tx: stub_context("s1", 100),
            replaced: vec![stub_tx("ghost")],
        });
        ledger.strip_intermediate();
    }
}
