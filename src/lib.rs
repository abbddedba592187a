//! RaceChain - a proof-of-work ledger where miners race to commit each transfer
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Ledger
//! - [`blockchain`] - Blocks, the append-only chain and tip snapshots
//! - [`transaction`] - Transfer payloads and admission rules
//!
//! ## Participants
//! - [`participant`] - Balances, local ledger views, users
//! - [`miner`] - Proof-of-work mining and the miner participant
//! - [`registry`] - Roster of participants keyed by name
//!
//! ## Coordination
//! - [`transfer`] - Validation, mining race and commit sequence
//! - [`simulation`] - Wiring a coordinator from configuration
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Ledger
// ============================================================================
pub mod blockchain;
pub mod transaction;

// ============================================================================
// Participants
// ============================================================================
pub mod miner;
pub mod participant;
pub mod registry;

// ============================================================================
// Coordination
// ============================================================================
pub mod simulation;
pub mod transfer;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
