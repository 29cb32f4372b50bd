use super::{serialize_input, serialize_output, serialize_witnesses, varint};
use crate::parsing::transaction_structs::Transaction;

// Weight multipliers for calculation of weight units from bytes:
// -------------------
// Field	Multiplier
// version	x4
// marker	x1
// flag		x1
// input	x4
// output	x4
// witness	x1
// locktime	x4

// returns: true if any input of the transaction carries a witness
pub fn is_segwit(tx: &Transaction) -> bool {
    tx.vin.iter().any(|txin| txin.witness.is_some())
}

// size in bytes of the transaction without witness data
fn base_size(tx: &Transaction) -> u64 {
    let mut buffer = Vec::new();
    buffer.extend(varint(tx.vin.len() as u64));
    for input in &tx.vin {
        serialize_input(&mut buffer, input);
    }
    buffer.extend(varint(tx.vout.len() as u64));
    for output in &tx.vout {
        serialize_output(&mut buffer, output);
    }
    // 4 bytes version + 4 bytes locktime
    buffer.len() as u64 + 8
}

// size in bytes of all serialized witness stacks
fn witness_size(tx: &Transaction) -> u64 {
    let mut buffer = Vec::new();
    serialize_witnesses(&mut buffer, tx);
    buffer.len() as u64
}

// weight units of the transaction, witness bytes counted once and
// everything else four times
pub fn transaction_weight(tx: &Transaction) -> u64 {
    let mut weight = base_size(tx) * 4;
    if is_segwit(tx) {
        weight += 2; // marker 1 byte + flag 1 byte
        weight += witness_size(tx);
    }
    weight
}

// virtual size used for fee rate math, weight divided by four rounded up
pub fn transaction_vsize(tx: &Transaction) -> u64 {
    (transaction_weight(tx) + 3) / 4
}
