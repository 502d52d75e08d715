//! Risk and margin accounting for OpenExchange.
//!
//! Tracks per-user balances and, for futures contracts, per-symbol
//! margin positions. One [`engine::RiskEngine`] per shard, mirroring
//! the matching engine's per-shard ownership — no locking, because a
//! shard processes one command at a time.

pub mod engine;
pub mod error;
pub mod profile;
pub mod types;

pub use engine::RiskEngine;
pub use error::RiskError;
pub use profile::{BalanceAdjOutcome, UserProfile};
pub use types::{Direction, LastPrice, MarginPosition};

/// Result type for risk operations.
pub type Result<T> = std::result::Result<T, RiskError>;
