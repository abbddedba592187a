//! Proof-of-work mining and the miner participant.
//!
//! Mining is a blocking nonce search, meant to run on a blocking thread.
//! A shared [`CancelFlag`] lets the race coordinator stop losing miners.

use crate::blockchain::{Block, Blockchain, ChainTip};
use crate::error::MiningError;
use crate::participant::{Account, LedgerView, Participant, Role};
use crate::transaction::{Coin, TransactionPayload};
use parking_lot::RwLock;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Raised once a race is decided; miners poll it while working.
pub type CancelFlag = Arc<AtomicBool>;

/// Nonce attempts between cancellation checks when none is configured
pub const DEFAULT_CHECK_INTERVAL: u64 = 1_024;

const DELAY_SLICE: Duration = Duration::from_millis(5);

/// Mine `block` to completion, starting from its current nonce.
pub fn mine_block(block: Block) -> Result<Block, MiningError> {
    mine_block_cancellable(block, &AtomicBool::new(false), DEFAULT_CHECK_INTERVAL)
}

/// Search nonces from `block.header.nonce` upward (wrapping) until the hash
/// meets the difficulty target, the flag is raised, or every nonce was tried.
pub fn mine_block_cancellable(
    mut block: Block,
    cancel: &AtomicBool,
    check_interval: u64,
) -> Result<Block, MiningError> {
    let target = Block::hash_to_target(block.header.difficulty);
    let start = block.header.nonce;
    let check_interval = check_interval.max(1);
    let mut attempts: u64 = 0;

    loop {
        if attempts % check_interval == 0 && cancel.load(Ordering::Acquire) {
            return Err(MiningError::Cancelled);
        }

        if block.hash() <= target {
            return Ok(block);
        }

        attempts += 1;
        block.header.nonce = block.header.nonce.wrapping_add(1);
        if block.header.nonce == start {
            return Err(MiningError::NonceExhausted(block.header.height));
        }
    }
}

/// How a simulated miner behaves when asked to mine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MiningBehavior {
    #[default]
    Honest,
    /// Always fails without producing a block
    Faulty,
    /// Waits before starting the nonce search
    Delayed(Duration),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinerStats {
    pub blocks_won: u64,
    pub total_rewards: Coin,
    pub last_block_time: Option<Duration>,
}

/// A participant that can mine blocks and collect rewards.
#[derive(Debug)]
pub struct Miner {
    account: Account,
    behavior: RwLock<MiningBehavior>,
    stats: RwLock<MinerStats>,
}

impl Miner {
    pub fn new(name: impl Into<String>, balance: Coin) -> Self {
        Self::with_behavior(name, balance, MiningBehavior::Honest)
    }

    pub fn with_behavior(name: impl Into<String>, balance: Coin, behavior: MiningBehavior) -> Self {
        Self {
            account: Account::new(name, balance),
            behavior: RwLock::new(behavior),
            stats: RwLock::new(MinerStats::default()),
        }
    }

    pub fn behavior(&self) -> MiningBehavior {
        *self.behavior.read()
    }

    pub fn set_behavior(&self, behavior: MiningBehavior) {
        *self.behavior.write() = behavior;
    }

    pub fn stats(&self) -> MinerStats {
        self.stats.read().clone()
    }

    /// Try to mine a block carrying `payload` on top of `tip`.
    pub fn mine(
        &self,
        payload: &TransactionPayload,
        tip: ChainTip,
        cancel: &AtomicBool,
        check_interval: u64,
    ) -> Result<Block, MiningError> {
        match self.behavior() {
            MiningBehavior::Honest => {}
            MiningBehavior::Faulty => return Err(MiningError::Faulted(self.name().to_string())),
            MiningBehavior::Delayed(delay) => wait_unless_cancelled(delay, cancel)?,
        }

        let started = Instant::now();
        let mut candidate = Block::on_tip(&tip, payload.clone(), self.name());
        // Each miner searches its own region of the nonce space.
        candidate.header.nonce = rand::thread_rng().gen();

        let block = mine_block_cancellable(candidate, cancel, check_interval)?;
        let elapsed = started.elapsed();
        self.stats.write().last_block_time = Some(elapsed);
        debug!(miner = %self.name(), height = block.header.height, ?elapsed, "Found block");
        Ok(block)
    }

    /// Credit a mining reward.
    pub fn grant_reward(&self, reward: Coin) {
        self.account.credit(reward);
        let mut stats = self.stats.write();
        stats.blocks_won += 1;
        stats.total_rewards = stats.total_rewards.saturating_add(reward);
    }
}

fn wait_unless_cancelled(delay: Duration, cancel: &AtomicBool) -> Result<(), MiningError> {
    let deadline = Instant::now() + delay;
    loop {
        if cancel.load(Ordering::Acquire) {
            return Err(MiningError::Cancelled);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        thread::sleep(DELAY_SLICE.min(deadline - now));
    }
}

impl Participant for Miner {
    fn name(&self) -> &str {
        self.account.name()
    }

    fn role(&self) -> Role {
        Role::Miner
    }

    fn balance(&self) -> Coin {
        self.account.balance()
    }

    fn ledger_view(&self) -> LedgerView {
        self.account.ledger_view()
    }

    fn sync_ledger(&self, ledger: &Blockchain) -> usize {
        self.account.sync_ledger(ledger)
    }

    fn apply_send(&self, payload: &TransactionPayload) {
        self.account.debit(payload.amount);
    }

    fn apply_receive(&self, payload: &TransactionPayload) {
        self.account.credit(payload.amount);
    }
}
