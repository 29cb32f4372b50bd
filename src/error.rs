use thiserror::Error;

// Malformed caller input detected while assembling a graph. Violated
// internal invariants (a missing change output after a merge, value
// underflow) are panic-class instead, see the graph module.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("transaction {txid} has no inputs or no outputs")]
    EmptyTransaction { txid: String },
    #[error("duplicate transaction {txid} in graph")]
    DuplicateTx { txid: String },
}
