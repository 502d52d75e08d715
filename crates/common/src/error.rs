//! Common error types for OpenExchange

use thiserror::Error;

/// Common error type used across OpenExchange crates
#[derive(Error, Debug)]
pub enum Error {
    /// Wire codec failure: truncated buffer, bad length prefix, unknown tag
    #[error("Codec error: {0}")]
    Codec(String),
}

/// Result type alias using the common Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a codec error
    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }
}
