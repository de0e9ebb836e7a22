use crate::Balance;
use thiserror::Error;

/// Why a transaction was refused entry into the pending pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(&'static str),
    #[error("insufficient balance for {address}: {balance} < {requested}")]
    InsufficientBalance {
        address: String,
        balance: Balance,
        requested: u64,
    },
}

/// First integrity violation found while walking the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChainValidationError {
    #[error("block {index}: stored hash does not match its contents")]
    HashMismatch { index: u64 },
    #[error("block {index}: previous hash does not link to its predecessor")]
    LinkMismatch { index: u64 },
    #[error("block {index}: hash does not meet difficulty {difficulty}")]
    InsufficientWork { index: u64, difficulty: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MiningError {
    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },
}
