//! Configuration data structures for OpenExchange.
//!
//! Plain `serde`-deserializable structs with sane defaults. No
//! file-loading, environment substitution, or schema validation layer —
//! callers decode these from whatever configuration source they use.

use serde::{Deserialize, Serialize};

/// Governs journal buffering, compression, and rotation for a shard's
/// write-ahead log.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Size in bytes at which a buffered batch of journal commands is
    /// flushed even if no `PersistState`/`Reset` command has arrived.
    pub journal_buf_size_bytes: u32,
    /// Flushed batches at or above this size are LZ4-compressed before
    /// being written; smaller batches are written raw.
    pub journal_batch_compress_threshold_bytes: u32,
    /// Journal files are rotated to a new partition once they reach
    /// this size.
    pub journal_file_max_size_bytes: u64,
    /// Sequence number below which journaling is skipped entirely,
    /// used when warming up from a snapshot taken at a later sequence.
    pub enable_journal_after_seq: i64,
    /// When true, replay aborts if the snapshot referenced by a journal
    /// chain cannot be found on disk; when false, replay starts from
    /// an empty state and logs a warning instead.
    pub panic_if_snapshot_not_found: bool,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            journal_buf_size_bytes: 64 * 1024,
            journal_batch_compress_threshold_bytes: 4 * 1024,
            journal_file_max_size_bytes: 256 * 1024 * 1024,
            enable_journal_after_seq: 0,
            panic_if_snapshot_not_found: false,
        }
    }
}

/// Margin coefficients applied by the risk engine. Currently a flat
/// global default; per-symbol overrides are a placeholder for future
/// work and fall back to these values when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MarginConfig {
    /// Margin coefficient applied per unit of quantity on the buy side.
    pub default_margin_buy: i64,
    /// Margin coefficient applied per unit of quantity on the sell side.
    pub default_margin_sell: i64,
}

impl Default for MarginConfig {
    fn default() -> Self {
        Self {
            default_margin_buy: 0,
            default_margin_sell: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_config_default_matches_documented_values() {
        let cfg = JournalConfig::default();
        assert_eq!(cfg.journal_buf_size_bytes, 64 * 1024);
        assert_eq!(cfg.journal_batch_compress_threshold_bytes, 4 * 1024);
        assert_eq!(cfg.journal_file_max_size_bytes, 256 * 1024 * 1024);
        assert_eq!(cfg.enable_journal_after_seq, 0);
        assert!(!cfg.panic_if_snapshot_not_found);
    }

    #[test]
    fn journal_config_deserializes_partial_overrides() {
        let cfg: JournalConfig = serde_json::from_str(r#"{"panic_if_snapshot_not_found": true}"#)
            .expect("partial JournalConfig should deserialize with defaults filled in");
        assert!(cfg.panic_if_snapshot_not_found);
        assert_eq!(cfg.journal_buf_size_bytes, JournalConfig::default().journal_buf_size_bytes);
    }

    #[test]
    fn margin_config_default_is_zeroed() {
        let cfg = MarginConfig::default();
        assert_eq!(cfg.default_margin_buy, 0);
        assert_eq!(cfg.default_margin_sell, 0);
    }
}
