//! Proof-of-work target checks and nonce search.
use crate::{codec, Hash};
use rayon::prelude::*;
use sha2::{Digest, Sha256};

pub fn count_leading_zero_bits(hash: &Hash) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += 8;
        } else {
            total += b.leading_zeros();
            break;
        }
    }
    total
}

/// Leading `0` characters in the lowercase hex rendering of `hash`.
pub fn leading_zero_hex_digits(hash: &Hash) -> u32 {
    count_leading_zero_bits(hash) / 4
}

pub fn meets_difficulty(hash: &Hash, difficulty: u32) -> bool {
    leading_zero_hex_digits(hash) >= difficulty
}

/// Hash of `prefix` followed by `nonce` as little-endian bytes.
pub(crate) fn hash_with_nonce(prefix: &Sha256, nonce: u64) -> Hash {
    let mut hasher = prefix.clone();
    hasher.update(nonce.to_le_bytes());
    codec::digest_to_hash(hasher)
}

/// Searches `start..` on the rayon pool and returns the lowest nonce whose
/// hash meets `difficulty`, i.e. the same nonce a sequential search finds.
pub fn find_nonce_parallel(prefix: &[u8], start: u64, difficulty: u32) -> Option<u64> {
    let base = Sha256::new_with_prefix(prefix);
    (start..u64::MAX)
        .into_par_iter()
        .find_first(|nonce| meets_difficulty(&hash_with_nonce(&base, *nonce), difficulty))
}
