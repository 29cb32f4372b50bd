pub mod transaction_structs;

use self::transaction_structs::Transaction;
use log::warn;
use serde_json::from_str;

// applies the serde function on the String content of one esplora-style
// json document and caches txid/wtxid/vsize on success
// returns: Some(Transaction struct) if serde could parse it successfully
pub fn parse_transaction(str_content: &str) -> Option<Transaction> {
    match from_str::<Transaction>(str_content) {
        Ok(mut tx) => {
            tx.compute_ids();
            Some(tx)
        }
        Err(err) => {
            warn!("discarding unparseable transaction document: {err}");
            None
        }
    }
}
