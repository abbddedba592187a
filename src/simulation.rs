use crate::blockchain::Blockchain;
use crate::config::{load_config, Config};
use crate::error::{ChainError, ConfigError};
use crate::participant::Participant;
use crate::registry::Registry;
use crate::transaction::Coin;
use crate::transfer::{Coordinator, TransferReceipt};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// A ledger, its roster and the coordinator driving them, built from config.
#[derive(Debug)]
pub struct Simulation {
    pub config: Config,
    coordinator: Coordinator,
}

impl Simulation {
    /// Load `racechain.toml` (or defaults) and build the simulation.
    pub fn init() -> Result<Self, ConfigError> {
        Self::new(load_config()?)
    }

    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let settings = config.race.settings()?;

        let ledger = Blockchain::new(config.ledger.difficulty)?;

        let balance = Coin::checked_from_num(config.roster.starting_balance).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "roster.starting_balance {} is out of range",
                config.roster.starting_balance
            ))
        })?;

        let registry = Registry::new();
        for name in &config.roster.users {
            registry.register_user(name, balance)?;
        }
        for name in &config.roster.miners {
            registry.register_miner(name, balance)?;
        }
        registry.sync_all(&ledger);

        info!(
            users = config.roster.users.len(),
            miners = config.roster.miners.len(),
            difficulty = config.ledger.difficulty,
            "Simulation ready"
        );

        let coordinator = Coordinator::new(Arc::new(RwLock::new(ledger)), registry, settings);
        Ok(Self { config, coordinator })
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn registry(&self) -> &Registry {
        self.coordinator.registry()
    }

    pub async fn transfer(&self, sender: &str, receiver: &str, amount: Coin, reward: Coin) -> TransferReceipt {
        self.coordinator.transfer_by_name(sender, receiver, amount, reward).await
    }

    pub async fn chain_height(&self) -> u64 {
        self.coordinator.ledger().read().await.tip().height
    }

    /// Re-check every block of the ledger and every participant's view of it.
    pub async fn verify_ledger(&self) -> crate::error::Result<()> {
        let chain = self.coordinator.ledger().read().await;
        chain.verify_chain()?;

        for participant in self.registry().participants() {
            if participant.ledger_view().blocks() != chain.blocks() {
                return Err(ChainError::InvalidBlock(format!(
                    "Ledger view of {} is out of date",
                    participant.name()
                )));
            }
        }
        Ok(())
    }
}
