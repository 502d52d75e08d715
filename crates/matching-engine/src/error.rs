//! Matching engine error types

use thiserror::Error;

/// Errors that can occur during order matching. These are the
/// command-level failures of §7: they select a [`common::ResultCode`]
/// and a Reject event rather than aborting the shard.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchingError {
    #[error("unknown order id: {0}")]
    UnknownOrderId(i64),

    #[error("duplicate order id: {0}")]
    DuplicateOrderId(i64),

    #[error("reduce failed: wrong quantity {0}")]
    ReduceFailedWrongQuantity(i64),

    #[error("move failed: price invalid")]
    MoveFailedPriceInvalid,

    #[error("move failed: price over risk limit")]
    MoveFailedPriceOverRiskLimit,

    #[error("order book not found for symbol {0}")]
    InvalidOrderBookId(i32),

    #[error("order book already exists for symbol {0}")]
    OrderBookAlreadyExists(i32),

    /// An invariant the book is supposed to maintain internally was
    /// found violated; this is a programming error, not a command
    /// failure, and callers should treat it as shard-fatal.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}
