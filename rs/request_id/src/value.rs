//! The value model that request records are reduced to before hashing, and
//! the representation-independent hash of each kind of value.

use sha2::{Digest, Sha256};

/// A field value of a request record.
#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) enum RequestIdValue {
    String(String),
    Bytes(Vec<u8>),
    U64(u64),
    Array(Vec<RequestIdValue>),
    /// A nested record, as (field name, value) pairs in serialization order.
    Map(Vec<(Vec<u8>, RequestIdValue)>),
}

pub(crate) fn hash_string(value: &str) -> [u8; 32] {
    hash_bytes(value.as_bytes())
}

pub(crate) fn hash_bytes(value: &[u8]) -> [u8; 32] {
    Sha256::digest(value).into()
}

pub(crate) fn hash_u64(value: u64) -> [u8; 32] {
    // At most ⌈ 64 / 7 ⌉ = 10 bytes.
    let mut buf = Vec::with_capacity(10);
    // Writing into a Vec cannot fail.
    let _ = leb128::write::unsigned(&mut buf, value);
    hash_bytes(&buf)
}

// Arrays hash to the digest of the concatenation of the element hashes.
pub(crate) fn hash_array(elements: &[RequestIdValue]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    elements
        .iter()
        .for_each(|e| hasher.update(hash_val(e)));
    hasher.finalize().into()
}

pub(crate) fn hash_val(val: &RequestIdValue) -> [u8; 32] {
    match val {
        RequestIdValue::String(string) => hash_string(string),
        RequestIdValue::Bytes(bytes) => hash_bytes(bytes),
        RequestIdValue::U64(integer) => hash_u64(*integer),
        RequestIdValue::Array(elements) => hash_array(elements),
        RequestIdValue::Map(fields) => hash_of_map(fields),
    }
}

fn hash_key_val(key: &[u8], val: &RequestIdValue) -> [u8; 64] {
    let mut block = [0u8; 64];
    block[..32].copy_from_slice(&hash_bytes(key));
    block[32..].copy_from_slice(&hash_val(val));
    block
}

/// Hashes a record: each field contributes the 64-byte block
/// `H(name) · H(value)`, the blocks are sorted as unsigned byte strings and
/// the digest of their concatenation is returned.
pub(crate) fn hash_of_map(fields: &[(Vec<u8>, RequestIdValue)]) -> [u8; 32] {
    let mut blocks: Vec<[u8; 64]> = fields
        .iter()
        .map(|(key, val)| hash_key_val(key, val))
        .collect();

    // `[u8; 64]` compares bytes as unsigned values.
    blocks.sort_unstable();

    let mut hasher = Sha256::new();
    for block in blocks {
        hasher.update(block);
    }
    hasher.finalize().into()
}
