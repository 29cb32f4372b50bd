// Consensus byte serialization of transactions. Used to derive txids and
// wtxids, to measure weight/vsize, and to reassemble the merged replacement
// transaction produced by chain compaction.

pub mod weight;

use crate::parsing::transaction_structs::{Transaction, TxIn, TxOut};
use byteorder::{ByteOrder, LittleEndian};
use hex_literal::hex as hexlit;
use sha2::{Digest, Sha256};

// converts a given u64 integer to a little endian Vec<u8> with variable
// size according to the bitcoin serialization rules
pub fn varint(n: u64) -> Vec<u8> {
    if n <= 252 {
        vec![n as u8]
    } else if n <= 0xffff {
        let mut bytes = vec![0xfd, 0, 0];
        LittleEndian::write_u16(&mut bytes[1..], n as u16);
        bytes
    } else if n <= 0xffffffff {
        let mut bytes = vec![0xfe, 0, 0, 0, 0];
        LittleEndian::write_u32(&mut bytes[1..], n as u32);
        bytes
    } else {
        let mut bytes = vec![0xff, 0, 0, 0, 0, 0, 0, 0, 0];
        LittleEndian::write_u64(&mut bytes[1..], n);
        bytes
    }
}

// returns: double sha256 digest of the passed byte slice
pub fn double_hash(preimage: &[u8]) -> Vec<u8> {
    let first = Sha256::digest(preimage);
    Sha256::digest(first).to_vec()
}

// returns: reversed double sha256 digest of the preimage, hex encoded in
// the display byte order used everywhere else in this crate
pub fn txid_hex(preimage: &[u8]) -> String {
    let mut digest = double_hash(preimage);
    digest.reverse();
    hex::encode(digest)
}

// appends outpoint, scriptsig and sequence of the TxIn to the buffer
// panics: on invalid hex in the input fields
pub fn serialize_input(buffer: &mut Vec<u8>, input: &TxIn) {
    let mut txid_bytes = hex::decode(&input.txid).expect("input txid is not valid hex");
    txid_bytes.reverse();
    buffer.extend(txid_bytes);
    let mut index = [0u8; 4];
    LittleEndian::write_u32(&mut index, input.vout);
    buffer.extend_from_slice(&index);
    let scriptsig = match &input.scriptsig {
        Some(hex_script) => hex::decode(hex_script).expect("input scriptsig is not valid hex"),
        None => Vec::new(),
    };
    buffer.extend(varint(scriptsig.len() as u64));
    buffer.extend(scriptsig);
    let mut sequence = [0u8; 4];
    LittleEndian::write_u32(&mut sequence, input.sequence);
    buffer.extend_from_slice(&sequence);
}

// appends value and scriptpubkey of the TxOut to the buffer
pub fn serialize_output(buffer: &mut Vec<u8>, output: &TxOut) {
    let mut value = [0u8; 8];
    LittleEndian::write_u64(&mut value, output.value);
    buffer.extend_from_slice(&value);
    let script = match &output.scriptpubkey {
        Some(hex_script) => hex::decode(hex_script).expect("output scriptpubkey is not valid hex"),
        None => Vec::new(),
    };
    buffer.extend(varint(script.len() as u64));
    buffer.extend(script);
}

// appends the witness stack of every input, 0x00 for non witness inputs
pub(crate) fn serialize_witnesses(buffer: &mut Vec<u8>, tx: &Transaction) {
    for input in &tx.vin {
        match &input.witness {
            Some(items) => {
                buffer.extend(varint(items.len() as u64));
                for item in items {
                    let item_bytes = hex::decode(item).expect("witness item is not valid hex");
                    buffer.extend(varint(item_bytes.len() as u64));
                    buffer.extend(item_bytes);
                }
            }
            None => buffer.extend(hexlit!("00")),
        }
    }
}

// assembles the full serialized transaction. with_witness selects the
// segwit encoding (marker, flag and witness stacks) used for the wtxid;
// without it the result is the legacy preimage the txid is derived from
pub fn tx_preimage(tx: &Transaction, with_witness: bool) -> Vec<u8> {
    let mut buffer = Vec::new();
    let mut version = [0u8; 4];
    LittleEndian::write_i32(&mut version, tx.version);
    buffer.extend_from_slice(&version);
    if with_witness {
        buffer.extend(hexlit!("0001"));
    }
    buffer.extend(varint(tx.vin.len() as u64));
    for input in &tx.vin {
        serialize_input(&mut buffer, input);
    }
    buffer.extend(varint(tx.vout.len() as u64));
    for output in &tx.vout {
        serialize_output(&mut buffer, output);
    }
    if with_witness {
        serialize_witnesses(&mut buffer, tx);
    }
    let mut locktime = [0u8; 4];
    LittleEndian::write_u32(&mut locktime, tx.locktime);
    buffer.extend_from_slice(&locktime);
    buffer
}

// hashes the serialized transaction once and fills in the meta block:
// txid from the legacy preimage, wtxid from the witness preimage (equal to
// the txid for non segwit transactions) and the virtual size
pub fn compute_ids(tx: &mut Transaction) {
    let txid = txid_hex(&tx_preimage(tx, false));
    tx.meta.wtxid_hex = if weight::is_segwit(tx) {
        txid_hex(&tx_preimage(tx, true))
    } else {
        txid.clone()
    };
    tx.meta.txid_hex = txid;
    tx.meta.vsize = weight::transaction_vsize(tx);
}
