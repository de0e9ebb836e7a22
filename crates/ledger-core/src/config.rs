use crate::constants::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD};
use serde::{Deserialize, Serialize};

/// Parameters fixed for the lifetime of a [`crate::Ledger`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Required number of leading zero hex digits in a mined block hash.
    pub difficulty: u32,
    /// Amount credited to the miner of each block.
    pub reward_amount: u64,
    /// Search nonces on the rayon pool instead of the calling thread.
    /// The winning nonce is the same either way. Only applies to
    /// `Ledger::mine_pending_transactions`; the cancellable variant always
    /// searches sequentially on the calling thread.
    pub parallel_mining: bool,
}

impl LedgerConfig {
    pub fn new(difficulty: u32, reward_amount: u64) -> Self {
        Self {
            difficulty,
            reward_amount,
            ..Self::default()
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            reward_amount: DEFAULT_MINING_REWARD,
            parallel_mining: false,
        }
    }
}
