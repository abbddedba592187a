//! Applies a won race to the ledger and the roster, in a fixed order:
//! append, sync every view, reward, then move the amount.

use crate::blockchain::{Block, Blockchain};
use crate::error::ChainError;
use crate::miner::Miner;
use crate::participant::Participant;
use crate::registry::Registry;
use crate::transaction::{Coin, TransactionPayload};
use tokio::sync::RwLock;
use tracing::info;

/// Everything a commit needs from a successful transfer attempt.
#[derive(Debug)]
pub struct CommitRequest<'a> {
    pub block: Block,
    pub winner: &'a Miner,
    pub payload: &'a TransactionPayload,
    pub sender: &'a dyn Participant,
    pub receiver: &'a dyn Participant,
    pub reward: Coin,
    pub validation_message: &'a str,
}

/// Result of a completed commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub message: String,
    pub miner: String,
    pub block_hash: String,
    pub height: u64,
}

/// Run the commit sequence. The caller holds the commit lock. A ledger
/// rejection returns before any participant is touched.
///
/// The ledger write guard is held until the balances have moved, so anyone
/// reading the ledger sees either none of the commit or all of it. Reading a
/// single balance without the ledger lock carries no such guarantee.
pub async fn commit(
    ledger: &RwLock<Blockchain>,
    registry: &Registry,
    request: CommitRequest<'_>,
) -> Result<Committed, ChainError> {
    let height = request.block.header.height;
    let block_hash = request.block.hash_str();

    let mut chain = ledger.write().await;
    chain.append(request.block)?;

    let copied = registry.sync_all(&chain);
    request.winner.grant_reward(request.reward);
    request.sender.apply_send(request.payload);
    request.receiver.apply_receive(request.payload);
    drop(chain);

    info!(
        height,
        hash = %block_hash,
        miner = %request.winner.name(),
        sender = %request.sender.name(),
        receiver = %request.receiver.name(),
        amount = %request.payload.amount,
        views_updated = copied,
        "Committed transfer"
    );

    Ok(Committed {
        message: format!("{} Mined by {}.", request.validation_message, request.winner.name()),
        miner: request.winner.name().to_string(),
        block_hash,
        height,
    })
}
