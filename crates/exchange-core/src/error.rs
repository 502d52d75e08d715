//! Shard-fatal error composition.
//!
//! Command-level failures never reach this type: they are reported as a
//! failing [`common::ResultCode`] inside an `Ok(MatcherResult)`. A
//! [`ShardError`] unwinds the dispatch call and is expected to
//! terminate the shard's run loop.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShardError {
    #[error(transparent)]
    Matching(#[from] matching_engine::MatchingError),

    #[error(transparent)]
    Risk(#[from] risk_engine::RiskError),

    #[error(transparent)]
    Storage(#[from] storage::StorageError),

    #[error(transparent)]
    Instrument(#[from] instrument::InstrumentError),

    #[error(transparent)]
    Codec(#[from] common::Error),

    /// A runtime invariant the shard depends on was found violated:
    /// negative pending quantity, inconsistent position state, a
    /// bucket total that doesn't sum its orders. A programming error,
    /// not a command failure.
    #[error("shard invariant violated: {0}")]
    InvariantViolation(String),
}
