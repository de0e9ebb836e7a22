use crate::{codec, error::TransactionError, now_millis, Hash};
use serde::{ser::SerializeStruct, Deserialize, Serialize, Serializer};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A transfer of `amount` from one address to another.
///
/// A transaction without a sender is a system credit (the mining reward).
/// Fields are fixed at construction; `sequence` is drawn from a process-wide
/// counter so two transfers with equal fields created in the same millisecond
/// still hash differently.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Transaction {
    from: Option<String>,
    to: String,
    amount: u64,
    timestamp: u64,
    sequence: u64,
}

impl Transaction {
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: u64) -> Self {
        Self::build(Some(from.into()), to.into(), amount)
    }

    pub fn reward(to: impl Into<String>, amount: u64) -> Self {
        Self::build(None, to.into(), amount)
    }

    fn build(from: Option<String>, to: String, amount: u64) -> Self {
        Self {
            from,
            to,
            amount,
            timestamp: now_millis(),
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn is_reward(&self) -> bool {
        self.from.is_none()
    }

    /// Structural checks only; the sender's balance is the ledger's concern.
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.amount == 0 {
            return Err(TransactionError::InvalidTransaction(
                "amount must be positive",
            ));
        }
        if self.from.as_deref() == Some(self.to.as_str()) {
            return Err(TransactionError::InvalidTransaction(
                "sender and recipient are the same address",
            ));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Canonical encoding: from, to, amount, timestamp, sequence.
    pub fn hash_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + 8 + 8 + self.to.len() + 8 * 4);
        self.write_canonical(&mut bytes);
        bytes
    }

    pub(crate) fn write_canonical(&self, buf: &mut Vec<u8>) {
        codec::put_opt_str(buf, self.from.as_deref());
        codec::put_str(buf, &self.to);
        codec::put_u64(buf, self.amount);
        codec::put_u64(buf, self.timestamp);
        codec::put_u64(buf, self.sequence);
    }

    pub fn hash(&self) -> Hash {
        codec::sha256(&self.hash_bytes())
    }

    #[cfg(test)]
    pub(crate) fn set_amount(&mut self, amount: u64) {
        self.amount = amount;
    }

    #[cfg(test)]
    pub(crate) fn at(from: Option<&str>, to: &str, amount: u64, timestamp: u64) -> Self {
        Self {
            from: from.map(str::to_string),
            to: to.to_string(),
            amount,
            timestamp,
            sequence: 0,
        }
    }
}

impl Serialize for Transaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Transaction", 6)?;
        state.serialize_field("from", &self.from)?;
        state.serialize_field("to", &self.to)?;
        state.serialize_field("amount", &self.amount)?;
        state.serialize_field("timestamp", &self.timestamp)?;
        state.serialize_field("sequence", &self.sequence)?;
        state.serialize_field("hash", &hex::encode(self.hash()))?;
        state.end()
    }
}
