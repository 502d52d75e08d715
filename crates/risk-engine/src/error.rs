//! Risk engine error types

use common::UserId;
use thiserror::Error;

/// Errors that can occur during risk accounting.
#[derive(Error, Debug)]
pub enum RiskError {
    #[error("unknown user: {0}")]
    UnknownUser(UserId),

    #[error("user already exists: {0}")]
    UserAlreadyExists(UserId),

    /// A margin position's internal bookkeeping was found inconsistent;
    /// this mirrors the reference's `ValidateInternalState`, which
    /// panics — here it is a recoverable error so callers can decide
    /// whether to treat it as shard-fatal.
    #[error("margin position invariant violated for user {user_id}, symbol {symbol_id}: {detail}")]
    InvariantViolation {
        user_id: UserId,
        symbol_id: i32,
        detail: String,
    },

    #[error(transparent)]
    Codec(#[from] common::Error),
}
