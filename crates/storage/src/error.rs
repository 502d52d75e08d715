//! Storage error types

use thiserror::Error;

/// Errors that can occur during journaling and snapshot persistence.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem I/O failure opening, writing, or reading a journal or
    /// snapshot file.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire codec failure decoding a command or snapshot payload.
    #[error(transparent)]
    Codec(#[from] common::Error),

    /// Journal data failed a corruption guard during replay: nested
    /// compressed blocks, an oversize block, or an unrecognized command
    /// code. Replay must not continue past this.
    #[error("journal corruption: {0}")]
    Corruption(String),

    /// A requested snapshot id has no corresponding file on disk.
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(i64),
}
