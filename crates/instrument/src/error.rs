//! Error types for the instrument crate.

use thiserror::Error;

/// Result type alias for instrument operations.
pub type InstrumentResult<T> = Result<T, InstrumentError>;

/// Errors that can occur in instrument operations.
#[derive(Error, Debug, Clone)]
pub enum InstrumentError {
    /// Symbol not found in the registry.
    #[error("Symbol not found: {0}")]
    NotFound(i32),

    /// A symbol with this id already exists with a differing definition.
    #[error("Symbol already exists: {0}")]
    AlreadyExists(i32),
}
