//! Append-only command journal: buffered writes with LZ4 batch
//! compression and file rotation, plus the replay path that turns a
//! journal file back into an ordered command list.

use crate::error::StorageError;
use common::codec::{write_i32, write_i8, Reader, WriteBuf};
use common::command::code;
use common::Command;
use config::JournalConfig;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A single buffered command is never expected to exceed this many
/// encoded bytes; the flush trigger leaves this much headroom in
/// `journal_buf_size_bytes` so one more command always fits before a
/// flush is forced.
const MAX_COMMAND_SIZE_BYTES: u32 = 256;

/// Corruption guards on a compressed block's declared sizes, matching
/// the reference journal reader.
const MAX_COMPRESSED_SIZE_BYTES: i32 = 1_000_000;
const MAX_ORIGINAL_SIZE_BYTES: i32 = 1_000_000;

/// Writes mutating commands to a rotating set of journal files under
/// one exchange id / snapshot id pair. One writer per shard.
pub struct JournalWriter {
    dir: PathBuf,
    exchange_id: i64,
    snapshot_id: i64,
    partition: u32,
    file: File,
    file_bytes: u64,
    buf: WriteBuf,
    config: JournalConfig,
}

impl JournalWriter {
    pub fn open(
        dir: impl Into<PathBuf>,
        exchange_id: i64,
        snapshot_id: i64,
        config: JournalConfig,
    ) -> Result<Self, StorageError> {
        Self::open_at_partition(dir, exchange_id, snapshot_id, 0, config)
    }

    /// Opens (or resumes appending to) the journal file at `partition`
    /// under `snapshot_id`, used when resuming a shard that replayed an
    /// existing journal chain and must keep appending after its last
    /// file rather than starting a fresh partition 0.
    pub fn open_at_partition(
        dir: impl Into<PathBuf>,
        exchange_id: i64,
        snapshot_id: i64,
        partition: u32,
        config: JournalConfig,
    ) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let path = journal_file_path(&dir, exchange_id, snapshot_id, partition);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let file_bytes = file.metadata()?.len();
        Ok(Self {
            dir,
            exchange_id,
            snapshot_id,
            partition,
            file,
            file_bytes,
            buf: WriteBuf::new(),
            config,
        })
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    pub fn current_path(&self) -> PathBuf {
        journal_file_path(&self.dir, self.exchange_id, self.snapshot_id, self.partition)
    }

    /// Brings the enable-after-seq gate back to its initial (disabled)
    /// state, as `Reset` does externally to the journal.
    pub fn reset_enable_gate(&mut self) {
        self.config.enable_journal_after_seq = 0;
    }

    /// Buffers `cmd`, flushing (and, for `Reset`/`PersistStateRisk`,
    /// rotating) when the command demands it. Commands at or below the
    /// enable-after-seq gate are silently dropped.
    pub fn append(&mut self, cmd: &Command) -> Result<(), StorageError> {
        if cmd.metadata().seq <= self.config.enable_journal_after_seq {
            return Ok(());
        }

        self.buf.extend_from_slice(&cmd.encode());

        let forces_rotation = matches!(cmd, Command::PersistStateRisk { .. } | Command::Reset { .. });
        let forces_flush = forces_rotation || matches!(cmd, Command::ShutdownSignal { .. });

        if forces_flush {
            self.flush()?;
            if forces_rotation {
                self.rotate()?;
            }
        } else if self.buf.len() as u32 >= self.flush_trigger_bytes() {
            self.flush()?;
        }
        Ok(())
    }

    /// Signals end-of-batch: flushes whatever is buffered even if the
    /// size trigger hasn't fired.
    pub fn end_batch(&mut self) -> Result<(), StorageError> {
        self.flush()
    }

    fn flush_trigger_bytes(&self) -> u32 {
        self.config.journal_buf_size_bytes.saturating_sub(MAX_COMMAND_SIZE_BYTES)
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let frame = if self.buf.len() as u32 >= self.config.journal_batch_compress_threshold_bytes {
            self.compress_frame()
        } else {
            std::mem::take(&mut self.buf)
        };
        self.file.write_all(&frame)?;
        self.file.flush()?;
        self.file_bytes += frame.len() as u64;
        if self.file_bytes >= self.config.journal_file_max_size_bytes {
            self.rotate()?;
        }
        Ok(())
    }

    fn compress_frame(&mut self) -> WriteBuf {
        let original = std::mem::take(&mut self.buf);
        let compressed = lz4_flex::block::compress(&original);
        let mut out = WriteBuf::with_capacity(9 + compressed.len());
        write_i8(&mut out, code::RESERVED_COMPRESSED);
        write_i32(&mut out, compressed.len() as i32);
        write_i32(&mut out, original.len() as i32);
        out.extend_from_slice(&compressed);
        out
    }

    fn rotate(&mut self) -> Result<(), StorageError> {
        self.partition += 1;
        let path = self.current_path();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        self.file_bytes = file.metadata()?.len();
        self.file = file;
        tracing::debug!(snapshot_id = self.snapshot_id, partition = self.partition, "rotated journal file");
        Ok(())
    }
}

pub fn journal_file_path(dir: &Path, exchange_id: i64, snapshot_id: i64, partition: u32) -> PathBuf {
    dir.join(format!("{exchange_id}_journal_{snapshot_id}_{partition:04X}.ecj"))
}

/// Replays one journal file into its ordered command list. Compressed
/// blocks are decompressed and parsed recursively (one level deep
/// only); a nested compressed block or an out-of-guard declared size is
/// a corruption error that aborts the whole replay.
pub fn replay_file(path: &Path) -> Result<Vec<Command>, StorageError> {
    let bytes = std::fs::read(path)?;
    let mut out = Vec::new();
    parse_into(&bytes, 0, &mut out)?;
    check_monotone_sequence(&out);
    Ok(out)
}

fn parse_into(buf: &[u8], depth: u8, out: &mut Vec<Command>) -> Result<(), StorageError> {
    let mut r = Reader::new(buf);
    while !r.is_empty() {
        let marker = r.read_i8()?;
        if marker == code::RESERVED_COMPRESSED {
            if depth > 0 {
                return Err(StorageError::Corruption("nested compressed block in journal".to_string()));
            }
            let compressed_len = r.read_i32()?;
            let original_len = r.read_i32()?;
            if !(0..=MAX_COMPRESSED_SIZE_BYTES).contains(&compressed_len) {
                return Err(StorageError::Corruption(format!(
                    "compressed block size {compressed_len} outside corruption guard"
                )));
            }
            if !(0..=MAX_ORIGINAL_SIZE_BYTES).contains(&original_len) {
                return Err(StorageError::Corruption(format!(
                    "original block size {original_len} outside corruption guard"
                )));
            }
            let compressed = r.read_raw(compressed_len as usize)?;
            let original = lz4_flex::block::decompress(compressed, original_len as usize)
                .map_err(|e| StorageError::Corruption(format!("lz4 decompress failed: {e}")))?;
            parse_into(&original, depth + 1, out)?;
        } else {
            out.push(Command::decode(marker, &mut r)?);
        }
    }
    Ok(())
}

/// Logs (without aborting) any gap in strictly +1 sequence numbers
/// across a replayed command list.
fn check_monotone_sequence(commands: &[Command]) {
    let mut prev: Option<i64> = None;
    for cmd in commands {
        let seq = cmd.metadata().seq;
        if let Some(p) = prev {
            if seq != p + 1 {
                tracing::warn!(expected = p + 1, actual = seq, "sequence gap during journal replay");
            }
        }
        prev = Some(seq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::command::Metadata;
    use common::{Action, OrderCategory};

    fn md(seq: i64) -> Metadata {
        Metadata {
            seq,
            timestamp_ns: 0,
            service_flags: 0,
            events_group: 0,
        }
    }

    fn place(seq: i64) -> Command {
        Command::Place {
            metadata: md(seq),
            user_id: 1,
            symbol_id: 1,
            order_id: seq,
            price: 100,
            reserved_bid_price: 0,
            quantity: 10,
            user_cookie: 0,
            action: Action::Bid,
            category: OrderCategory::Gtc,
        }
    }

    #[test]
    fn raw_write_round_trips_below_compress_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = JournalConfig::default();
        config.journal_batch_compress_threshold_bytes = 1_000_000;
        let mut writer = JournalWriter::open(dir.path(), 1, 0, config).unwrap();
        writer.append(&place(1)).unwrap();
        writer.append(&place(2)).unwrap();
        writer.end_batch().unwrap();

        let replayed = replay_file(&writer.current_path()).unwrap();
        assert_eq!(replayed, vec![place(1), place(2)]);
    }

    #[test]
    fn compressed_write_round_trips_above_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = JournalConfig::default();
        config.journal_batch_compress_threshold_bytes = 1;
        let mut writer = JournalWriter::open(dir.path(), 1, 0, config).unwrap();
        writer.append(&place(1)).unwrap();
        writer.append(&place(2)).unwrap();
        writer.end_batch().unwrap();

        let replayed = replay_file(&writer.current_path()).unwrap();
        assert_eq!(replayed, vec![place(1), place(2)]);
    }

    #[test]
    fn reset_forces_flush_and_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let config = JournalConfig::default();
        let mut writer = JournalWriter::open(dir.path(), 1, 0, config).unwrap();
        writer.append(&place(1)).unwrap();
        writer
            .append(&Command::Reset { metadata: md(2) })
            .unwrap();
        assert_eq!(writer.partition(), 1);
    }

    #[test]
    fn enable_after_seq_gate_drops_early_commands() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = JournalConfig::default();
        config.enable_journal_after_seq = 5;
        let mut writer = JournalWriter::open(dir.path(), 1, 0, config).unwrap();
        writer.append(&place(1)).unwrap();
        writer.append(&place(6)).unwrap();
        writer.end_batch().unwrap();

        let replayed = replay_file(&writer.current_path()).unwrap();
        assert_eq!(replayed, vec![place(6)]);
    }

    #[test]
    fn nested_compressed_block_is_corruption_error() {
        let inner_frame = {
            let mut out = WriteBuf::new();
            write_i8(&mut out, code::RESERVED_COMPRESSED);
            write_i32(&mut out, 0);
            write_i32(&mut out, 0);
            out
        };
        let compressed = lz4_flex::block::compress(&inner_frame);
        let mut outer = WriteBuf::new();
        write_i8(&mut outer, code::RESERVED_COMPRESSED);
        write_i32(&mut outer, compressed.len() as i32);
        write_i32(&mut outer, inner_frame.len() as i32);
        outer.extend_from_slice(&compressed);

        let mut out = Vec::new();
        assert!(matches!(parse_into(&outer, 0, &mut out), Err(StorageError::Corruption(_))));
    }

    #[test]
    fn open_at_partition_resumes_appending_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = JournalConfig::default();
        let mut writer = JournalWriter::open(dir.path(), 1, 0, config.clone()).unwrap();
        writer.append(&place(1)).unwrap();
        writer.end_batch().unwrap();

        let mut resumed = JournalWriter::open_at_partition(dir.path(), 1, 0, 0, config).unwrap();
        resumed.append(&place(2)).unwrap();
        resumed.end_batch().unwrap();

        let replayed = replay_file(&resumed.current_path()).unwrap();
        assert_eq!(replayed, vec![place(1), place(2)]);
    }

    #[test]
    fn gap_in_sequence_does_not_abort_replay() {
        let dir = tempfile::tempdir().unwrap();
        let config = JournalConfig::default();
        let mut writer = JournalWriter::open(dir.path(), 1, 0, config).unwrap();
        writer.append(&place(1)).unwrap();
        writer.append(&place(3)).unwrap();
        writer.end_batch().unwrap();

        let replayed = replay_file(&writer.current_path()).unwrap();
        assert_eq!(replayed, vec![place(1), place(3)]);
    }
}
