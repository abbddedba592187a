//! Error types for RaceChain

use thiserror::Error;

/// Reasons the ledger refuses a block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Stale chain tip: block builds on {found}, current tip is {expected}")]
    StaleTip { expected: String, found: String },
    #[error("Invalid block height. Expected {expected}, but got {found}.")]
    InvalidHeight { expected: u64, found: u64 },
    #[error("Invalid proof of work")]
    InvalidProofOfWork,
    #[error("Payload hash mismatch")]
    PayloadMismatch,
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

/// Reasons a single miner gives up on a race.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiningError {
    #[error("Mining cancelled")]
    Cancelled,
    #[error("Nonce space exhausted at height {0}")]
    NonceExhausted(u64),
    #[error("Miner {0} failed to produce a block")]
    Faulted(String),
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Reasons a proposed transfer is inadmissible.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Transaction does not involve any coin.")]
    NoAmount,
    #[error("Invalid transaction entities.")]
    InvalidParties,
    #[error("Sender doesn't have enough coins.")]
    InsufficientBalance,
    #[error("Receiver cannot hold that many coins.")]
    ReceiverOverflow,
    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),
}

/// Failures of a transfer attempt after validation succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("No miner produced a block")]
    RaceExhausted,
    #[error("Ledger rejected block: {0}")]
    LedgerRejected(#[from] ChainError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Roster bookkeeping failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Name cannot be empty")]
    EmptyName,
    #[error("Name too long: {0} characters (max {1})")]
    NameTooLong(usize, usize),
    #[error("Name contains control characters")]
    InvalidName,
    #[error("Participant '{0}' already exists")]
    Duplicate(String),
    #[error("Registry is full (max {0} participants)")]
    Full(usize),
}

/// Problems loading or checking `racechain.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid duration {value:?}: {reason}")]
    Duration { value: String, reason: String },
    #[error("Invalid config: {0}")]
    Invalid(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
