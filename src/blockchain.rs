// Thin re-export module: implementation is in `blockchain/core.rs`, split into
// chain management, block validation and tip snapshots.

pub mod core;
pub use core::*;
