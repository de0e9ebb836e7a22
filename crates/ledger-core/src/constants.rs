pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const ZERO_HASH: [u8; HASH_SIZE] = [0u8; HASH_SIZE];
pub const DEFAULT_DIFFICULTY: u32 = 2;
pub const DEFAULT_MINING_REWARD: u64 = 100;
/// Fixed so the genesis block hashes identically on every run.
pub const GENESIS_TIMESTAMP: u64 = 1_600_000_000_000;
