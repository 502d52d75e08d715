//! Order matching engine.
//!
//! Implements deterministic price-time priority matching over a fixed,
//! integer-keyed domain: one [`engine::MatchingEngine`] per shard, one
//! [`book::OrderBook`] per symbol.
//!
//! # Architecture
//!
//! The engine is a pure state machine: `(book, command) -> (book',
//! events)`. Given the same sequence of commands, it always produces the
//! same sequence of events — this is what makes journal replay and
//! snapshotting (see the `storage` crate) sound.
//!
//! ## Core components
//!
//! - [`domain`] — the resting/incoming [`domain::Order`]
//! - [`bucket`] — one price level's FIFO queue and its matching core
//! - [`book`] — a symbol's two-sided book (GTC/IOC/FOK-Budget, cancel,
//!   reduce, move, L2 projection)
//! - [`engine`] — the per-shard map of books
//! - [`event`] — the event chain a command produces
//! - [`result`] — what a book operation returns

pub mod book;
pub mod bucket;
pub mod domain;
pub mod engine;
pub mod error;
pub mod event;
pub mod result;

pub use book::{OrderBook, PriceLevel};
pub use domain::Order;
pub use engine::MatchingEngine;
pub use error::MatchingError;
pub use event::{EventChain, MatchingEvent};
pub use result::MatcherResult;
