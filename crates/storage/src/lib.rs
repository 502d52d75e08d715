//! Journaling and snapshot persistence for OpenExchange.
//!
//! A shard's durability story has two halves: [`journal`] appends every
//! mutating command to a rotating, optionally LZ4-compressed file, and
//! [`snapshot`] checkpoints full engine state and tracks which journals
//! hang off which snapshot. Replay from any registered snapshot plus its
//! journals reproduces the shard's state deterministically.

pub mod error;
pub mod journal;
pub mod snapshot;

pub use error::StorageError;
pub use journal::{journal_file_path, replay_file, JournalWriter};
pub use snapshot::{read_snapshot, snapshot_file_path, write_snapshot, JournalDescriptor, SnapshotCategory, SnapshotChain, SnapshotDescriptor};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
