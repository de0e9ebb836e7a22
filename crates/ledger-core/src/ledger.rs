use crate::{
    error::{ChainValidationError, MiningError, TransactionError},
    Balance, Block, LedgerConfig, Transaction,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::AtomicBool;
use tracing::{debug, info, warn};

/// Summary counters for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    pub blocks: usize,
    pub difficulty: u32,
    pub pending_transactions: usize,
    pub is_valid: bool,
}

/// Single-writer blockchain: the block sequence plus the pool of accepted,
/// not yet mined transactions.
///
/// The chain always starts with [`Block::genesis`] and only grows by mining.
/// Balances are replayed from the confirmed chain on every query. The ledger
/// is not internally synchronized; hosts sharing it across threads must put
/// the whole value behind one lock.
#[derive(Clone, Debug, Serialize)]
pub struct Ledger {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
    difficulty: u32,
    reward_amount: u64,
    #[serde(skip)]
    parallel_mining: bool,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        let genesis = Block::genesis();
        info!(hash = %hex::encode(genesis.hash()), "genesis block created");
        Self {
            chain: vec![genesis],
            pending: Vec::new(),
            difficulty: config.difficulty,
            reward_amount: config.reward_amount,
            parallel_mining: config.parallel_mining,
        }
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn reward_amount(&self) -> u64 {
        self.reward_amount
    }

    pub fn latest_block(&self) -> &Block {
        // the chain is never empty
        &self.chain[self.chain.len() - 1]
    }

    /// Validates `tx` and queues it for the next block.
    ///
    /// The sender's balance is taken from the confirmed chain only, so
    /// transactions already pending are not counted against it. Transactions
    /// without a sender skip the balance check. On error the pool is unchanged.
    pub fn submit_transaction(&mut self, tx: Transaction) -> Result<(), TransactionError> {
        if let Err(e) = tx.validate() {
            warn!(error = %e, "rejected transaction");
            return Err(e);
        }
        if let Some(sender) = tx.from() {
            let balance = self.get_balance(sender);
            if balance < Balance::from(tx.amount()) {
                let e = TransactionError::InsufficientBalance {
                    address: sender.to_string(),
                    balance,
                    requested: tx.amount(),
                };
                warn!(error = %e, "rejected transaction");
                return Err(e);
            }
        }
        debug!(
            from = tx.from().unwrap_or("<system>"),
            to = tx.to(),
            amount = tx.amount(),
            "transaction added to pending pool"
        );
        self.pending.push(tx);
        Ok(())
    }

    /// Boolean form of [`Ledger::submit_transaction`].
    pub fn add_transaction(&mut self, tx: Transaction) -> bool {
        self.submit_transaction(tx).is_ok()
    }

    /// Mines every pending transaction plus a reward for `miner_address` into
    /// a new block, appends it and empties the pool. Blocks until a nonce is
    /// found. Pending transactions are not re-checked here.
    pub fn mine_pending_transactions(&mut self, miner_address: &str) -> &Block {
        let mut block = self.candidate_block(miner_address);
        info!(index = block.index(), difficulty = self.difficulty, "mining block");
        if self.parallel_mining {
            block.mine_parallel(self.difficulty);
        } else {
            block.mine(self.difficulty);
        }
        self.append(block)
    }

    /// As [`Ledger::mine_pending_transactions`], but stops when `cancel` is
    /// set. A cancelled run leaves both the chain and the pending pool as
    /// they were.
    pub fn mine_pending_transactions_cancellable(
        &mut self,
        miner_address: &str,
        cancel: &AtomicBool,
    ) -> Result<&Block, MiningError> {
        let mut block = self.candidate_block(miner_address);
        info!(index = block.index(), difficulty = self.difficulty, "mining block");
        if let Err(e) = block.mine_cancellable(self.difficulty, cancel) {
            warn!(index = block.index(), error = %e, "mining aborted");
            return Err(e);
        }
        Ok(self.append(block))
    }

    fn candidate_block(&self, miner_address: &str) -> Block {
        let mut transactions = self.pending.clone();
        transactions.push(Transaction::reward(miner_address, self.reward_amount));
        Block::new(
            self.chain.len() as u64,
            transactions,
            self.latest_block().hash(),
        )
    }

    fn append(&mut self, block: Block) -> &Block {
        info!(
            index = block.index(),
            nonce = block.nonce(),
            hash = %hex::encode(block.hash()),
            txs = block.transactions().len(),
            "block mined"
        );
        let index = self.chain.len();
        self.chain.push(block);
        self.pending.clear();
        &self.chain[index]
    }

    /// Net amount received by `address` across every confirmed block.
    pub fn get_balance(&self, address: &str) -> Balance {
        let mut balance: Balance = 0;
        for tx in self.chain.iter().flat_map(|b| b.transactions()) {
            if tx.from() == Some(address) {
                balance -= Balance::from(tx.amount());
            }
            if tx.to() == address {
                balance += Balance::from(tx.amount());
            }
        }
        balance
    }

    /// Runs [`validate_blocks`] over this ledger's chain.
    pub fn validate_chain(&self) -> Result<(), ChainValidationError> {
        validate_blocks(&self.chain, self.difficulty)
    }

    pub fn is_chain_valid(&self) -> bool {
        self.validate_chain().is_ok()
    }

    pub fn chain_info(&self) -> ChainInfo {
        ChainInfo {
            blocks: self.chain.len(),
            difficulty: self.difficulty,
            pending_transactions: self.pending.len(),
            is_valid: self.is_chain_valid(),
        }
    }

    #[cfg(test)]
    pub(crate) fn chain_mut(&mut self) -> &mut Vec<Block> {
        &mut self.chain
    }
}

/// Checks every block after the first, in order: stored hash against its
/// contents, link to the predecessor, then the proof-of-work target.
/// Reports the first failure; nothing is repaired.
pub fn validate_blocks(blocks: &[Block], difficulty: u32) -> Result<(), ChainValidationError> {
    for pair in blocks.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        let index = current.index();
        let failure = if current.hash() != current.compute_hash() {
            Some(ChainValidationError::HashMismatch { index })
        } else if current.previous_hash() != previous.hash() {
            Some(ChainValidationError::LinkMismatch { index })
        } else if !current.meets_difficulty(difficulty) {
            Some(ChainValidationError::InsufficientWork { index, difficulty })
        } else {
            None
        };
        if let Some(e) = failure {
            warn!(error = %e, "chain validation failed");
            return Err(e);
        }
    }
    Ok(())
}

impl fmt::Display for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{rule}")?;
        writeln!(f, "BLOCKCHAIN CONTENTS")?;
        writeln!(f, "{rule}")?;
        for block in &self.chain {
            writeln!(f)?;
            writeln!(f, "Block {}", block.index())?;
            writeln!(f, "  Hash:          {}", hex::encode(block.hash()))?;
            writeln!(f, "  Previous Hash: {}", hex::encode(block.previous_hash()))?;
            writeln!(f, "  Timestamp:     {}", block.timestamp())?;
            writeln!(f, "  Nonce:         {}", block.nonce())?;
            writeln!(f, "  Transactions:  {}", block.transactions().len())?;
            for (i, tx) in block.transactions().iter().enumerate() {
                writeln!(
                    f,
                    "    {}. {} -> {}: {}",
                    i + 1,
                    tx.from().unwrap_or("None"),
                    tx.to(),
                    tx.amount()
                )?;
            }
        }
        write!(f, "{rule}")
    }
}
