//! Transfer coordinator: validate, race the miners, commit the winner.
//!
//! [`Coordinator::transfer`] is the entry point. It never leaves partial
//! state behind: a transfer either commits every step of
//! [`commit::commit`] or changes nothing.

pub mod commit;
pub mod race;

pub use commit::{CommitRequest, Committed};
pub use race::{run_race, RaceOutcome};

use crate::blockchain::Blockchain;
use crate::config::RaceSettings;
use crate::error::{TransferError, ValidationError};
use crate::participant::Participant;
use crate::registry::Registry;
use crate::transaction::{ensure_receiver_capacity, validate, Coin, TransactionPayload, VALID_MESSAGE};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// What the caller of [`Coordinator::transfer`] gets back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub status: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
}

impl TransferReceipt {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
            miner: None,
            block_hash: None,
        }
    }
}

impl From<Committed> for TransferReceipt {
    fn from(committed: Committed) -> Self {
        Self {
            status: true,
            message: committed.message,
            miner: Some(committed.miner),
            block_hash: Some(committed.block_hash),
        }
    }
}

/// Drives transfers against one ledger and one roster.
#[derive(Debug)]
pub struct Coordinator {
    ledger: Arc<RwLock<Blockchain>>,
    registry: Registry,
    settings: RaceSettings,
    /// Serializes commit sequences across concurrent transfers
    commit_lock: Mutex<()>,
}

impl Coordinator {
    pub fn new(ledger: Arc<RwLock<Blockchain>>, registry: Registry, settings: RaceSettings) -> Self {
        Self {
            ledger,
            registry,
            settings,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn ledger(&self) -> &Arc<RwLock<Blockchain>> {
        &self.ledger
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn settings(&self) -> &RaceSettings {
        &self.settings
    }

    /// Move `amount` from `sender` to `receiver`, paying `reward` to whichever
    /// miner commits the block. Every failure is reported in the receipt.
    pub async fn transfer(
        &self,
        sender: &Arc<dyn Participant>,
        receiver: &Arc<dyn Participant>,
        amount: Coin,
        reward: Coin,
    ) -> TransferReceipt {
        match self.try_transfer(sender, receiver, amount, reward).await {
            Ok(committed) => committed.into(),
            // The transfer was admissible; it just never got a block.
            Err(TransferError::RaceExhausted) => TransferReceipt::failed(VALID_MESSAGE),
            Err(error) => TransferReceipt::failed(error.to_string()),
        }
    }

    /// [`Self::transfer`] with parties looked up by name.
    pub async fn transfer_by_name(&self, sender: &str, receiver: &str, amount: Coin, reward: Coin) -> TransferReceipt {
        let resolve = |name: &str| {
            self.registry
                .get(name)
                .ok_or_else(|| ValidationError::UnknownParticipant(name.trim().to_string()))
        };

        match (resolve(sender), resolve(receiver)) {
            (Ok(sender), Ok(receiver)) => self.transfer(&sender, &receiver, amount, reward).await,
            (Err(error), _) | (_, Err(error)) => TransferReceipt::failed(error.to_string()),
        }
    }

    /// Typed form of [`Self::transfer`].
    pub async fn try_transfer(
        &self,
        sender: &Arc<dyn Participant>,
        receiver: &Arc<dyn Participant>,
        amount: Coin,
        reward: Coin,
    ) -> Result<Committed, TransferError> {
        let payload = TransactionPayload::new(sender.name(), receiver.name(), amount);
        let mut attempt = 0u32;

        loop {
            let validation_message = validate(sender.as_ref(), receiver.as_ref(), amount).into_result()?;
            let tip = self.ledger.read().await.tip();
            let miners = self.registry.miners();

            debug!(tx = %payload.hash_str(), attempt, "Transfer validated");

            let (winner, block) = match run_race(&payload, tip, &miners, &self.settings).await {
                RaceOutcome::Won { winner, block } => (winner, block),
                RaceOutcome::Exhausted { .. } | RaceOutcome::TimedOut { .. } => {
                    warn!(sender = %sender.name(), receiver = %receiver.name(), "No miner produced a block");
                    return Err(TransferError::RaceExhausted);
                }
            };

            let _guard = self.commit_lock.lock().await;

            // Balances may have moved while we raced.
            if sender.balance() < amount {
                return Err(ValidationError::InsufficientBalance.into());
            }
            ensure_receiver_capacity(receiver.as_ref(), amount)?;

            let request = CommitRequest {
                block,
                winner: &winner,
                payload: &payload,
                sender: sender.as_ref(),
                receiver: receiver.as_ref(),
                reward,
                validation_message: &validation_message,
            };

            match commit::commit(&self.ledger, &self.registry, request).await {
                Ok(committed) => {
                    info!(message = %committed.message, "Transfer complete");
                    return Ok(committed);
                }
                Err(error) if attempt < self.settings.max_retries => {
                    warn!(%error, attempt, "Winning block rejected, racing again");
                    attempt += 1;
                }
                Err(error) => {
                    warn!(%error, "Winning block rejected");
                    return Err(error.into());
                }
            }
        }
    }
}
