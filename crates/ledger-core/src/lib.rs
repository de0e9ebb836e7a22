//! Single-process ledger: hash-linked blocks, proof-of-work mining, a pending
//! transaction pool and balances replayed from the confirmed chain.
use std::time::{SystemTime, UNIX_EPOCH};

pub mod block;
pub mod config;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod pow;
pub mod transaction;

mod codec;

pub use block::Block;
pub use config::LedgerConfig;
pub use error::{ChainValidationError, MiningError, TransactionError};
pub use ledger::{validate_blocks, ChainInfo, Ledger};
pub use transaction::Transaction;

pub type Hash = [u8; 32];

/// Signed so that a sender overdrawn by several pending transfers shows a
/// negative balance instead of wrapping.
pub type Balance = i128;

/// Milliseconds since the unix epoch; 0 if the clock is before it.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
