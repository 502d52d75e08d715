//! Shard orchestration: wires one matching engine, one risk engine and
//! one symbol registry to one journal/snapshot pair, dispatching every
//! wire command to the right engine and folding the margin
//! consequences of a fill back into the risk engine.

pub mod error;
pub mod shard;

pub use error::ShardError;
pub use shard::{DispatchOutcome, OrderBookView, Shard};
