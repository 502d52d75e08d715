//! Snapshot and journal descriptor bookkeeping.
//!
//! Snapshots form a chain by creation order; each journal file hangs
//! off a base snapshot, keyed by the sequence it starts at. Rather than
//! modeling that as a graph of back-pointers, descriptors live in a
//! flat arena indexed by `snapshot_id` / `(snapshot_id, seq_first)` —
//! cheaper to replay and trivial to reset.

use crate::error::StorageError;
use config::JournalConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Engine category a snapshot file belongs to, used in the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotCategory {
    RiskEngine,
    MatchingEngine,
}

impl SnapshotCategory {
    fn code(self) -> &'static str {
        match self {
            SnapshotCategory::RiskEngine => "RE",
            SnapshotCategory::MatchingEngine => "ME",
        }
    }
}

/// Describes a point-in-time full-state checkpoint. `snapshot_id == 0`
/// is the clean-start sentinel with no backing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDescriptor {
    pub snapshot_id: i64,
    pub seq: i64,
    pub timestamp_ns: i64,
    pub num_risk_engines: i32,
    pub num_matching_engines: i32,
    pub prev_snapshot_id: Option<i64>,
}

/// Describes one journal file: a contiguous run of sequence numbers
/// derived from `base_snapshot_id`. `seq_last` is `None` while the file
/// is still being appended to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalDescriptor {
    pub base_snapshot_id: i64,
    pub seq_first: i64,
    pub seq_last: Option<i64>,
    pub timestamp_ns: i64,
    pub partition: u32,
}

/// The full set of registered snapshots and journals for one exchange,
/// queryable for replay planning.
#[derive(Debug, Default)]
pub struct SnapshotChain {
    snapshots: HashMap<i64, SnapshotDescriptor>,
    creation_order: Vec<i64>,
    journals: HashMap<(i64, i64), JournalDescriptor>,
}

impl SnapshotChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_snapshot(&mut self, descriptor: SnapshotDescriptor) {
        self.creation_order.push(descriptor.snapshot_id);
        self.snapshots.insert(descriptor.snapshot_id, descriptor);
    }

    pub fn snapshot(&self, snapshot_id: i64) -> Option<&SnapshotDescriptor> {
        self.snapshots.get(&snapshot_id)
    }

    pub fn latest_snapshot(&self) -> Option<&SnapshotDescriptor> {
        self.creation_order.last().and_then(|id| self.snapshots.get(id))
    }

    pub fn register_journal(&mut self, descriptor: JournalDescriptor) {
        self.journals.insert((descriptor.base_snapshot_id, descriptor.seq_first), descriptor);
    }

    /// Closes the open journal file starting at `seq_first` off
    /// `base_snapshot_id`, recording its final sequence.
    pub fn close_journal(&mut self, base_snapshot_id: i64, seq_first: i64, seq_last: i64) {
        if let Some(journal) = self.journals.get_mut(&(base_snapshot_id, seq_first)) {
            journal.seq_last = Some(seq_last);
        }
    }

    /// Journals chained off `snapshot_id`, in starting-sequence order —
    /// the order they must be replayed in after loading that snapshot.
    pub fn journals_for(&self, snapshot_id: i64) -> Vec<&JournalDescriptor> {
        let mut journals: Vec<&JournalDescriptor> =
            self.journals.values().filter(|j| j.base_snapshot_id == snapshot_id).collect();
        journals.sort_by_key(|j| j.seq_first);
        journals
    }

    pub fn reset(&mut self) {
        self.snapshots.clear();
        self.creation_order.clear();
        self.journals.clear();
    }
}

pub fn snapshot_file_path(
    dir: &Path,
    exchange_id: i64,
    snapshot_id: i64,
    category: SnapshotCategory,
    instance_id: i32,
) -> PathBuf {
    dir.join(format!(
        "{exchange_id}_snapshot_{snapshot_id}_{}{instance_id}.ecs",
        category.code()
    ))
}

pub fn write_snapshot(
    dir: &Path,
    exchange_id: i64,
    snapshot_id: i64,
    category: SnapshotCategory,
    instance_id: i32,
    bytes: &[u8],
) -> Result<(), StorageError> {
    std::fs::create_dir_all(dir)?;
    let path = snapshot_file_path(dir, exchange_id, snapshot_id, category, instance_id);
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Loads a snapshot file's raw bytes. A missing file is either a fatal
/// panic or a recoverable [`StorageError::SnapshotNotFound`], per
/// `config.panic_if_snapshot_not_found`.
pub fn read_snapshot(
    dir: &Path,
    exchange_id: i64,
    snapshot_id: i64,
    category: SnapshotCategory,
    instance_id: i32,
    config: &JournalConfig,
) -> Result<Vec<u8>, StorageError> {
    let path = snapshot_file_path(dir, exchange_id, snapshot_id, category, instance_id);
    match std::fs::read(&path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if config.panic_if_snapshot_not_found {
                panic!("snapshot file not found: {}", path.display());
            }
            tracing::warn!(snapshot_id, path = %path.display(), "snapshot file not found");
            Err(StorageError::SnapshotNotFound(snapshot_id))
        }
        Err(e) => Err(StorageError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(id: i64, prev: Option<i64>) -> SnapshotDescriptor {
        SnapshotDescriptor {
            snapshot_id: id,
            seq: id * 100,
            timestamp_ns: 0,
            num_risk_engines: 1,
            num_matching_engines: 1,
            prev_snapshot_id: prev,
        }
    }

    #[test]
    fn latest_snapshot_tracks_creation_order() {
        let mut chain = SnapshotChain::new();
        chain.register_snapshot(snap(0, None));
        chain.register_snapshot(snap(1, Some(0)));
        assert_eq!(chain.latest_snapshot().unwrap().snapshot_id, 1);
    }

    #[test]
    fn journals_for_snapshot_sort_by_starting_sequence() {
        let mut chain = SnapshotChain::new();
        chain.register_journal(JournalDescriptor {
            base_snapshot_id: 0,
            seq_first: 50,
            seq_last: Some(99),
            timestamp_ns: 0,
            partition: 1,
        });
        chain.register_journal(JournalDescriptor {
            base_snapshot_id: 0,
            seq_first: 0,
            seq_last: Some(49),
            timestamp_ns: 0,
            partition: 0,
        });
        let journals = chain.journals_for(0);
        assert_eq!(journals.len(), 2);
        assert_eq!(journals[0].seq_first, 0);
        assert_eq!(journals[1].seq_first, 50);
    }

    #[test]
    fn close_journal_sets_seq_last() {
        let mut chain = SnapshotChain::new();
        chain.register_journal(JournalDescriptor {
            base_snapshot_id: 0,
            seq_first: 0,
            seq_last: None,
            timestamp_ns: 0,
            partition: 0,
        });
        chain.close_journal(0, 0, 99);
        assert_eq!(chain.journals_for(0)[0].seq_last, Some(99));
    }

    #[test]
    fn write_then_read_snapshot_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let config = JournalConfig::default();
        write_snapshot(dir.path(), 1, 0, SnapshotCategory::RiskEngine, 0, b"state").unwrap();
        let bytes = read_snapshot(dir.path(), 1, 0, SnapshotCategory::RiskEngine, 0, &config).unwrap();
        assert_eq!(bytes, b"state");
    }

    #[test]
    fn missing_snapshot_is_error_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = JournalConfig::default();
        let result = read_snapshot(dir.path(), 1, 7, SnapshotCategory::MatchingEngine, 0, &config);
        assert!(matches!(result, Err(StorageError::SnapshotNotFound(7))));
    }

    #[test]
    fn reset_clears_chain() {
        let mut chain = SnapshotChain::new();
        chain.register_snapshot(snap(0, None));
        chain.reset();
        assert!(chain.latest_snapshot().is_none());
    }
}
