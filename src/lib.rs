//! Dependency graph of a wallet's own unconfirmed bitcoin transactions with
//! chain compaction: an owned chain of change-spending transactions is
//! collapsed into a single unsigned replacement transaction that conserves
//! total value and total fee, the building block for an RBF rebroadcast.
//!
//! The caller supplies [`TransactionContext`] values (parsed transaction,
//! absolute fee, change script, ownership flag), builds an [`UnconfTxGraph`]
//! and requests compaction of target txids; signing and broadcasting the
//! result stays with the caller.

pub mod error;
pub mod graph;
pub mod parsing;
pub mod serialization;

pub use error::GraphError;
pub use graph::{Replacement, Replacements, TxNode, UnconfTxGraph, MAX_CHAIN_DEPTH};
pub use parsing::parse_transaction;
pub use parsing::transaction_structs::{Transaction, TransactionContext};
