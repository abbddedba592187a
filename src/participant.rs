//! Simulated participants and their private copies of the ledger.
//!
//! Every participant keeps a balance and a [`LedgerView`]. Users only send
//! and receive; miners ([`crate::miner::Miner`]) additionally race to mine
//! blocks and collect rewards. The coordinator handles both through the
//! [`Participant`] trait.

use crate::blockchain::{Block, Blockchain, Sha256Hash};
use crate::transaction::{Coin, TransactionPayload};
use parking_lot::RwLock;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Miner,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Miner => write!(f, "miner"),
        }
    }
}

/// A participant's local copy of the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerView {
    blocks: Vec<Block>,
}

impl LedgerView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn tip_hash(&self) -> Option<Sha256Hash> {
        self.blocks.last().map(Block::hash)
    }

    /// Bring this view in line with `ledger`, returning how many blocks were
    /// copied. Only the missing suffix is copied when the view is a prefix of
    /// the ledger; a diverged view is replaced wholesale.
    pub fn sync_from(&mut self, ledger: &Blockchain) -> usize {
        let authoritative = ledger.blocks();
        if self.tip_hash() == authoritative.last().map(Block::hash) && self.len() == authoritative.len() {
            return 0;
        }

        let is_prefix = self.len() <= authoritative.len()
            && self.blocks.last().map_or(true, |last| {
                authoritative[self.len() - 1].hash() == last.hash()
            });

        if is_prefix {
            let missing = &authoritative[self.len()..];
            self.blocks.extend_from_slice(missing);
            missing.len()
        } else {
            self.blocks = authoritative.to_vec();
            self.blocks.len()
        }
    }
}

/// Common capabilities of everyone on the roster.
pub trait Participant: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn role(&self) -> Role;

    fn balance(&self) -> Coin;

    /// A copy of this participant's local ledger view.
    fn ledger_view(&self) -> LedgerView;

    /// Synchronize the local view with the authoritative ledger. Returns the
    /// number of blocks copied; zero when the view was already current.
    fn sync_ledger(&self, ledger: &Blockchain) -> usize;

    /// Debit the payload amount.
    fn apply_send(&self, payload: &TransactionPayload);

    /// Credit the payload amount.
    fn apply_receive(&self, payload: &TransactionPayload);

    /// Lowercase key used for identity comparisons and registry lookups.
    fn key(&self) -> String {
        normalize_name(self.name())
    }
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Balance and ledger view shared by both participant variants.
#[derive(Debug)]
pub struct Account {
    name: String,
    balance: RwLock<Coin>,
    view: RwLock<LedgerView>,
}

impl Account {
    pub fn new(name: impl Into<String>, balance: Coin) -> Self {
        Self {
            name: name.into(),
            balance: RwLock::new(balance),
            view: RwLock::new(LedgerView::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn balance(&self) -> Coin {
        *self.balance.read()
    }

    pub fn credit(&self, amount: Coin) {
        let mut balance = self.balance.write();
        *balance = balance.saturating_add(amount).max(Coin::ZERO);
    }

    /// Balances never go negative; callers check funds before debiting.
    pub fn debit(&self, amount: Coin) {
        let mut balance = self.balance.write();
        *balance = balance.saturating_sub(amount).max(Coin::ZERO);
    }

    pub fn ledger_view(&self) -> LedgerView {
        self.view.read().clone()
    }

    pub fn sync_ledger(&self, ledger: &Blockchain) -> usize {
        let copied = self.view.write().sync_from(ledger);
        if copied > 0 {
            debug!(participant = %self.name, copied, "Synchronized ledger view");
        }
        copied
    }
}

/// A plain spender/receiver.
#[derive(Debug)]
pub struct User {
    account: Account,
}

impl User {
    pub fn new(name: impl Into<String>, balance: Coin) -> Self {
        Self {
            account: Account::new(name, balance),
        }
    }
}

impl Participant for User {
    fn name(&self) -> &str {
        self.account.name()
    }

    fn role(&self) -> Role {
        Role::User
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
