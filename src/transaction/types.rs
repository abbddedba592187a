/// Transaction types for RaceChain
use crate::blockchain::Sha256Hash;
use crate::error::ChainError;
use fixed::types::I32F32;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Currency unit held by participants. Fixed-point so balances add up exactly.
pub type Coin = I32F32;

/// Maximum encoded payload size in bytes
pub const MAX_PAYLOAD_SIZE: usize = 1_024;

/// The data a block commits to: one transfer between two named parties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPayload {
    pub sender: String,
    pub receiver: String,
    pub amount: Coin,
}

impl TransactionPayload {
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, amount: Coin) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
        }
    }

    /// Calculate the hash of this payload
    pub fn hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.sender.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.receiver.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.amount.to_bits().to_le_bytes());
        hasher.finalize().into()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash())
    }

    /// Reject payloads whose encoding would bloat a block
    pub fn validate_size(&self) -> Result<(), ChainError> {
        let serialized = bincode::serialize(self)?;
        if serialized.len() > MAX_PAYLOAD_SIZE {
            return Err(ChainError::InvalidBlock(format!(
                "Payload too large: {} bytes (max: {})",
                serialized.len(),
                MAX_PAYLOAD_SIZE
            )));
        }
        Ok(())
    }
}
