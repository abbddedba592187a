//! Mining race: every miner works on the same payload and the first block
//! to arrive wins.
//!
//! Results come back over a channel sized to the roster, so a miner never
//! blocks on reporting. The race resolves on the first success, or fails
//! once every miner has reported a failure or the deadline passes. When it
//! resolves, the shared cancellation flag is raised and anything still in
//! flight is dropped unseen.

use crate::blockchain::{Block, ChainTip};
use crate::config::RaceSettings;
use crate::error::MiningError;
use crate::miner::{CancelFlag, Miner};
use crate::participant::Participant;
use crate::transaction::TransactionPayload;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum RaceOutcome {
    Won { winner: Arc<Miner>, block: Block },
    /// Every miner reported a failure
    Exhausted { failures: Vec<(String, MiningError)> },
    /// The deadline passed with no winner
    TimedOut { failures: Vec<(String, MiningError)> },
}

impl RaceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RaceOutcome::Won { .. })
    }

    pub fn winner(&self) -> Option<&Arc<Miner>> {
        match self {
            RaceOutcome::Won { winner, .. } => Some(winner),
            _ => None,
        }
    }

    pub fn block(&self) -> Option<&Block> {
        match self {
            RaceOutcome::Won { block, .. } => Some(block),
            _ => None,
        }
    }
}

type MinerReport = (Arc<Miner>, Result<Block, MiningError>);

/// Race `miners` to mine `payload` on top of `tip`.
pub async fn run_race(
    payload: &TransactionPayload,
    tip: ChainTip,
    miners: &[Arc<Miner>],
    settings: &RaceSettings,
) -> RaceOutcome {
    if miners.is_empty() {
        warn!("Mining race started with no miners");
        return RaceOutcome::Exhausted { failures: Vec::new() };
    }

    let cancel: CancelFlag = Arc::new(AtomicBool::new(false));
    let (tx, mut rx) = mpsc::channel::<MinerReport>(miners.len());

    for miner in miners {
        let miner = Arc::clone(miner);
        let payload = payload.clone();
        let cancel = Arc::clone(&cancel);
        let tx = tx.clone();
        let check_interval = settings.cancel_check_interval;

        tokio::task::spawn_blocking(move || {
            let result = miner.mine(&payload, tip, &cancel, check_interval);
            // The receiver is gone once the race is decided.
            let _ = tx.blocking_send((miner, result));
        });
    }
    drop(tx);

    info!(miners = miners.len(), height = tip.next_height(), "Mining race started");

    let deadline = tokio::time::Instant::now() + settings.timeout;
    let mut failures = Vec::new();

    let outcome = loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some((miner, Ok(block)))) => {
                info!(winner = %miner.name(), hash = %block.hash_str(), "Mining race won");
                break RaceOutcome::Won { winner: miner, block };
            }
            Ok(Some((miner, Err(error)))) => {
                debug!(miner = %miner.name(), %error, "Miner dropped out of race");
                failures.push((miner.name().to_string(), error));
                if failures.len() == miners.len() {
                    break RaceOutcome::Exhausted { failures };
                }
            }
            // Every sender is gone without a success, e.g. a miner panicked.
            Ok(None) => break RaceOutcome::Exhausted { failures },
            Err(_) => {
                warn!(timeout = ?settings.timeout, "Mining race timed out");
                break RaceOutcome::TimedOut { failures };
            }
        }
    };

    cancel.store(true, Ordering::Release);
    outcome
}
