//! Roster of simulation participants.
//!
//! A thread-safe registry keyed by lowercase name. It is an explicit value
//! handed to the coordinator, so independent simulations never share state.

use crate::blockchain::Blockchain;
use crate::error::RegistryError;
use crate::miner::Miner;
use crate::participant::{normalize_name, Participant, User};
use crate::transaction::Coin;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const MAX_NAME_LENGTH: usize = 64;
const MAX_PARTICIPANTS: usize = 10_000;

/// Thread-safe participant registry
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<RegistryInner>>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    /// Everyone, keyed by lowercase name
    participants: HashMap<String, Arc<dyn Participant>>,

    /// The mining subset, same keys
    miners: HashMap<String, Arc<Miner>>,

    /// Keys in registration order
    order: Vec<String>,
}

impl RegistryInner {
    fn reserve(&self, name: &str) -> Result<String, RegistryError> {
        if self.participants.len() >= MAX_PARTICIPANTS {
            return Err(RegistryError::Full(MAX_PARTICIPANTS));
        }

        validate_name(name)?;
        let key = normalize_name(name);
        if self.participants.contains_key(&key) {
            return Err(RegistryError::Duplicate(name.trim().to_string()));
        }
        Ok(key)
    }
}

fn validate_name(name: &str) -> Result<(), RegistryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RegistryError::EmptyName);
    }
    let length = name.chars().count();
    if length > MAX_NAME_LENGTH {
        return Err(RegistryError::NameTooLong(length, MAX_NAME_LENGTH));
    }
    if name.chars().any(char::is_control) {
        return Err(RegistryError::InvalidName);
    }
    Ok(())
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_user(&self, name: &str, balance: Coin) -> Result<Arc<User>, RegistryError> {
        self.add_user(User::new(name.trim(), balance))
    }

    pub fn register_miner(&self, name: &str, balance: Coin) -> Result<Arc<Miner>, RegistryError> {
        self.add_miner(Miner::new(name.trim(), balance))
    }

    pub fn add_user(&self, user: User) -> Result<Arc<User>, RegistryError> {
        let mut inner = self.inner.write();
        let key = inner.reserve(user.name())?;

        let user = Arc::new(user);
        inner.participants.insert(key.clone(), user.clone());
        inner.order.push(key);
        debug!(name = %user.name(), "Registered user");
        Ok(user)
    }

    pub fn add_miner(&self, miner: Miner) -> Result<Arc<Miner>, RegistryError> {
        let mut inner = self.inner.write();
        let key = inner.reserve(miner.name())?;

        let miner = Arc::new(miner);
        inner.participants.insert(key.clone(), miner.clone());
        inner.miners.insert(key.clone(), miner.clone());
        inner.order.push(key);
        debug!(name = %miner.name(), "Registered miner");
        Ok(miner)
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<Arc<dyn Participant>> {
        self.inner.read().participants.get(&normalize_name(name)).cloned()
    }

    pub fn miner(&self, name: &str) -> Option<Arc<Miner>> {
        self.inner.read().miners.get(&normalize_name(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().participants.contains_key(&normalize_name(name))
    }

    /// All participants in registration order
    pub fn participants(&self) -> Vec<Arc<dyn Participant>> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|key| inner.participants.get(key).cloned())
            .collect()
    }

    /// Miners in registration order
    pub fn miners(&self) -> Vec<Arc<Miner>> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|key| inner.miners.get(key).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().participants.is_empty()
    }

    /// Fan the authoritative ledger out to every participant's local view.
    /// Returns the total number of blocks copied.
    pub fn sync_all(&self, ledger: &Blockchain) -> usize {
        self.participants()
            .iter()
            .map(|participant| participant.sync_ledger(ledger))
            .sum()
    }

    /// Sum of all balances
    pub fn total_supply(&self) -> Coin {
        self.participants()
            .iter()
            .fold(Coin::ZERO, |total, p| total.saturating_add(p.balance()))
    }
}
