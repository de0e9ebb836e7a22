//! Canonical byte encoding behind every hash in the ledger.
//!
//! Integers are little-endian `u64`. Strings are a `u64` byte length followed
//! by their UTF-8 bytes. An optional sender is a single `0x00` tag when absent,
//! or `0x01` followed by the string. Each type fixes its own field order; see
//! `Transaction::hash_bytes` and `Block::hash_bytes`.
use crate::Hash;
use sha2::{Digest, Sha256};

pub(crate) fn put_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_str(buf: &mut Vec<u8>, value: &str) {
    put_u64(buf, value.len() as u64);
    buf.extend_from_slice(value.as_bytes());
}

pub(crate) fn put_opt_str(buf: &mut Vec<u8>, value: Option<&str>) {
    match value {
        None => buf.push(0x00),
        Some(s) => {
            buf.push(0x01);
            put_str(buf, s);
        }
    }
}

pub(crate) fn digest_to_hash(hasher: Sha256) -> Hash {
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

pub(crate) fn sha256(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    digest_to_hash(hasher)
}

/// Serde adapter rendering a [`Hash`] as lowercase hex.
pub(crate) mod hex_hash {
    use crate::Hash;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut out = [0u8; 32];
        hex::decode_to_slice(&s, &mut out).map_err(D::Error::custom)?;
        Ok(out)
    }
}
