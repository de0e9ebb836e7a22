use crate::{
    codec,
    constants::{GENESIS_TIMESTAMP, ZERO_HASH},
    error::MiningError,
    now_millis, pow, Hash, Transaction,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// An ordered batch of transactions linked to its predecessor by hash.
///
/// `hash` always equals [`Block::compute_hash`] for blocks produced by this
/// crate; the nonce only changes while mining.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    timestamp: u64,
    transactions: Vec<Transaction>,
    #[serde(with = "codec::hex_hash")]
    previous_hash: Hash,
    nonce: u64,
    #[serde(with = "codec::hex_hash")]
    hash: Hash,
}

impl Block {
    pub fn new(index: u64, transactions: Vec<Transaction>, previous_hash: Hash) -> Self {
        Self::with_timestamp(index, now_millis(), transactions, previous_hash)
    }

    /// A zero-transaction block with a zeroed previous hash and fixed timestamp.
    pub fn genesis() -> Self {
        Self::with_timestamp(0, GENESIS_TIMESTAMP, vec![], ZERO_HASH)
    }

    pub(crate) fn with_timestamp(
        index: u64,
        timestamp: u64,
        transactions: Vec<Transaction>,
        previous_hash: Hash,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            transactions,
            previous_hash,
            nonce: 0,
            hash: ZERO_HASH,
        };
        block.hash = block.compute_hash();
        block
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn previous_hash(&self) -> Hash {
        self.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// The stored hash, as of the last mining step.
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Every field except the nonce, which is always encoded last.
    fn prefix_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 * 3 + 64 * self.transactions.len() + 32);
        codec::put_u64(&mut bytes, self.index);
        codec::put_u64(&mut bytes, self.timestamp);
        codec::put_u64(&mut bytes, self.transactions.len() as u64);
        for tx in &self.transactions {
            tx.write_canonical(&mut bytes);
        }
        bytes.extend_from_slice(&self.previous_hash);
        bytes
    }

    /// Canonical encoding: index, timestamp, transaction count, each
    /// transaction's canonical bytes, previous hash, nonce.
    pub fn hash_bytes(&self) -> Vec<u8> {
        let mut bytes = self.prefix_bytes();
        codec::put_u64(&mut bytes, self.nonce);
        bytes
    }

    pub fn compute_hash(&self) -> Hash {
        codec::sha256(&self.hash_bytes())
    }

    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        pow::meets_difficulty(&self.hash, difficulty)
    }

    /// Increments the nonce from its current value until the hash has
    /// `difficulty` leading zero hex digits. Blocks until found.
    pub fn mine(&mut self, difficulty: u32) {
        let prefix = Sha256::new_with_prefix(self.prefix_bytes());
        let mut hash = pow::hash_with_nonce(&prefix, self.nonce);
        while !pow::meets_difficulty(&hash, difficulty) {
            self.nonce = self.nonce.wrapping_add(1);
            hash = pow::hash_with_nonce(&prefix, self.nonce);
        }
        self.hash = hash;
        debug!(index = self.index, nonce = self.nonce, "nonce found");
    }

    /// Like [`Block::mine`], but gives up once `cancel` is set. A cancelled
    /// block keeps a consistent nonce/hash pair but does not meet the target.
    pub fn mine_cancellable(
        &mut self,
        difficulty: u32,
        cancel: &AtomicBool,
    ) -> Result<(), MiningError> {
        let prefix = Sha256::new_with_prefix(self.prefix_bytes());
        let start = self.nonce;
        let mut hash = pow::hash_with_nonce(&prefix, self.nonce);
        while !pow::meets_difficulty(&hash, difficulty) {
            if cancel.load(Ordering::Relaxed) {
                self.hash = hash;
                return Err(MiningError::Cancelled {
                    attempts: self.nonce.wrapping_sub(start) + 1,
                });
            }
            self.nonce = self.nonce.wrapping_add(1);
            hash = pow::hash_with_nonce(&prefix, self.nonce);
        }
        self.hash = hash;
        debug!(index = self.index, nonce = self.nonce, "nonce found");
        Ok(())
    }

    /// Same result as [`Block::mine`], searched on the rayon pool.
    pub fn mine_parallel(&mut self, difficulty: u32) {
        match pow::find_nonce_parallel(&self.prefix_bytes(), self.nonce, difficulty) {
            Some(nonce) => {
                self.nonce = nonce;
                self.hash = self.compute_hash();
                debug!(index = self.index, nonce = self.nonce, "nonce found");
            }
            // Every nonce above the start failed; fall back to the wrapping search.
            None => self.mine(difficulty),
        }
    }

    #[cfg(test)]
    pub(crate) fn transactions_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.transactions
    }

    #[cfg(test)]
    pub(crate) fn set_previous_hash(&mut self, previous_hash: Hash) {
        self.previous_hash = previous_hash;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_txs() -> Vec<Transaction> {
        vec![
            Transaction::at(Some("Alice"), "Bob", 10, 1_600_000_000_000),
            Transaction::at(Some("Bob"), "Charlie", 5, 1_600_000_100_000),
        ]
    }

    #[test]
    fn genesis_block_example() {
        let genesis = Block::genesis();
        assert_eq!(genesis.index(), 0);
        assert_eq!(genesis.previous_hash(), [0u8; 32]);
        assert_eq!(genesis.nonce(), 0);
        assert_eq!(genesis.transactions().len(), 0);
        assert_eq!(genesis.hash(), genesis.compute_hash());
        assert_eq!(genesis, Block::genesis());
    }

    #[test]
    fn new_block_starts_unmined() {
        let block = Block::new(1, sample_txs(), [7u8; 32]);
        assert_eq!(block.nonce(), 0);
        assert_eq!(block.hash(), block.compute_hash());
        assert!(block.timestamp() > 0);
    }

    #[test]
    fn hash_bytes_layout() {
        let block = Block::with_timestamp(3, 42, vec![], [1u8; 32]);
        let bytes = block.hash_bytes();
        assert_eq!(bytes.len(), 8 + 8 + 8 + 32 + 8);
        assert_eq!(&bytes[0..8], &3u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &42u64.to_le_bytes());
        assert_eq!(&bytes[16..24], &0u64.to_le_bytes());
        assert_eq!(&bytes[24..56], &[1u8; 32]);
        assert_eq!(&bytes[56..64], &0u64.to_le_bytes());
    }

    #[test]
    fn hash_covers_full_transactions() {
        let txs = sample_txs();
        let block = Block::with_timestamp(1, 1_600_000_200_000, txs.clone(), [0u8; 32]);
        let bytes = block.hash_bytes();
        let first = txs[0].hash_bytes();
        assert_eq!(&bytes[24..24 + first.len()], first.as_slice());
    }

    #[test]
    fn transaction_order_is_significant() {
        let txs = sample_txs();
        let mut reversed = txs.clone();
        reversed.reverse();
        let a = Block::with_timestamp(1, 1_600_000_200_000, txs, [0u8; 32]);
        let b = Block::with_timestamp(1, 1_600_000_200_000, reversed, [0u8; 32]);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn block_hash_changes_with_nonce() {
        let mut block = Block::with_timestamp(1, 1_600_000_200_000, sample_txs(), [0u8; 32]);
        let hash1 = block.compute_hash();
        block.nonce += 1;
        let hash2 = block.compute_hash();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn mine_block_example() {
        let mut block = Block::new(1, sample_txs(), [0u8; 32]);
        block.mine(2);
        assert!(hex::encode(block.hash()).starts_with("00"));
        assert_eq!(block.hash(), block.compute_hash());
        assert!(block.meets_difficulty(2));
    }

    #[test]
    fn mine_takes_the_first_satisfying_nonce() {
        let mut block = Block::with_timestamp(1, 1_600_000_200_000, sample_txs(), [0u8; 32]);
        let mut candidate = block.clone();
        block.mine(2);
        for nonce in 0..block.nonce() {
            candidate.nonce = nonce;
            assert!(!pow::meets_difficulty(&candidate.compute_hash(), 2));
        }
    }

    #[test]
    fn zero_difficulty_keeps_nonce_zero() {
        let mut block = Block::new(1, sample_txs(), [0u8; 32]);
        block.mine(0);
        assert_eq!(block.nonce(), 0);
    }

    #[test]
    fn parallel_mining_matches_sequential() {
        let mut sequential = Block::with_timestamp(1, 1_600_000_200_000, sample_txs(), [0u8; 32]);
        let mut parallel = sequential.clone();
        sequential.mine(3);
        parallel.mine_parallel(3);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn cancelled_mining_stops_early() {
        let mut block = Block::new(1, sample_txs(), [0u8; 32]);
        let cancel = AtomicBool::new(true);
        // 64 hex zeros is unreachable, so only the flag can end the search.
        let err = block.mine_cancellable(64, &cancel).unwrap_err();
        assert_eq!(err, MiningError::Cancelled { attempts: 1 });
        assert_eq!(block.hash(), block.compute_hash());
        assert!(!block.meets_difficulty(64));
    }

    #[test]
    fn uncancelled_mining_completes() {
        let mut block = Block::new(1, sample_txs(), [0u8; 32]);
        let cancel = AtomicBool::new(false);
        block.mine_cancellable(2, &cancel).unwrap();
        assert!(block.meets_difficulty(2));
    }

    #[test]
    fn block_serialization_example() {
        let mut block = Block::new(1, sample_txs(), [0u8; 32]);
        block.mine(1);
        let json = serde_json::to_value(&block).unwrap();
        for field in ["index", "timestamp", "transactions", "previous_hash", "nonce", "hash"] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        assert_eq!(json["previous_hash"], "0".repeat(64));
        assert_eq!(json["hash"], hex::encode(block.hash()));
        let back: Block = serde_json::from_value(json).unwrap();
        assert_eq!(back, block);
    }
}
