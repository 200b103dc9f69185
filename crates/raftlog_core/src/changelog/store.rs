//! The changelog coordinator.

use crate::changelog::descriptor::SegmentDescriptor;
use crate::changelog::reader::{ReadResult, SegmentReader};
use crate::changelog::record::ChangelogRecord;
use crate::changelog::writer::{SegmentWriter, WriteMode};
use crate::config::Config;
use crate::dir::ChangelogDir;
use crate::entry::{LogEntry, LogIndex};
use crate::error::{ChangelogError, ChangelogResult};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::error;

/// Persistent, segmented store for Raft log entries.
///
/// The changelog owns a directory of segment files plus two in-memory maps
/// rebuilt at startup: `index -> entry` serving reads and `index -> byte
/// offset` locating each record for rollback truncation. All mutating
/// operations must be serialized by the caller; the coordinator itself
/// takes no locks beyond the directory-level advisory lock.
///
/// # Lifecycle
///
/// ```ignore
/// let mut changelog = Changelog::new(&dir, 100_000)?;
/// changelog.read_and_init(last_snapshot_index)?;
/// changelog.append(changelog.next_entry_index(), entry, true)?;
/// ```
///
/// [`Changelog::read_and_init`] must run before any write: it replays the
/// segments, drops whatever a crash tore, and leaves a writer positioned
/// at the log's end.
pub struct Changelog {
    dir: ChangelogDir,
    prefix: String,
    rotate_interval: u64,
    existing_segments: BTreeMap<LogIndex, SegmentDescriptor>,
    logs: BTreeMap<LogIndex, LogEntry>,
    index_to_offset: HashMap<LogIndex, u64>,
    current_writer: Option<SegmentWriter>,
    start_index: LogIndex,
}

impl Changelog {
    /// Opens a changelog with the default configuration and the given
    /// rotation interval.
    ///
    /// # Errors
    ///
    /// See [`Changelog::open`].
    pub fn new(path: &Path, rotate_interval: u64) -> ChangelogResult<Self> {
        Self::open(path, &Config::new().rotate_interval(rotate_interval))
    }

    /// Opens a changelog directory: creates it if absent, locks it, and
    /// enumerates the existing segments.
    ///
    /// No entries are loaded yet; call [`Changelog::read_and_init`] next.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid configuration, a locked or
    /// unscannable directory, or an unparsable segment filename.
    pub fn open(path: &Path, config: &Config) -> ChangelogResult<Self> {
        config.validate()?;
        let dir = ChangelogDir::open(path)?;
        let existing_segments = dir.scan()?;

        Ok(Self {
            dir,
            prefix: config.prefix.clone(),
            rotate_interval: config.rotate_interval,
            existing_segments,
            logs: BTreeMap::new(),
            index_to_offset: HashMap::new(),
            current_writer: None,
            start_index: 1,
        })
    }

    /// Loads all entries with index at or above `from_log_idx` (0 means 1)
    /// and positions a writer at the end of the log.
    ///
    /// Whole segments are trusted as-is. The first segment holding fewer
    /// records than its filename declares is the crash frontier: its torn
    /// suffix is truncated away and it is reopened for appending, and every
    /// segment past it is deleted - nothing after an incomplete segment can
    /// be assumed gap-free. If all segments are whole, a fresh segment is
    /// rotated in.
    ///
    /// # Errors
    ///
    /// Returns an error if segment files cannot be opened, truncated, or
    /// deleted. Torn or corrupt tails are not errors; they are repaired.
    pub fn read_and_init(&mut self, from_log_idx: LogIndex) -> ChangelogResult<()> {
        self.start_index = if from_log_idx == 0 { 1 } else { from_log_idx };

        let mut total_read = 0u64;
        let mut entries_in_last = 0u64;
        let mut incomplete_from_idx = None;
        let mut result = ReadResult::default();

        for descriptor in self.existing_segments.values() {
            entries_in_last = descriptor.expected_entries();

            if descriptor.to_idx >= from_log_idx {
                let mut reader = SegmentReader::open(&descriptor.path)?;
                result = reader.read_into(&mut self.logs, from_log_idx, &mut self.index_to_offset);
                total_read += result.entries_read;

                // Fewer records than the filename declares: crash frontier.
                if result.entries_read < entries_in_last {
                    incomplete_from_idx = Some(descriptor.from_idx);
                    break;
                }
            }
        }

        if let Some(from_idx) = incomplete_from_idx {
            let untrusted = self.existing_segments.split_off(&(from_idx + 1));
            for descriptor in untrusted.values() {
                fs::remove_file(&descriptor.path)?;
            }
        }

        match self.existing_segments.values().next_back().cloned() {
            Some(descriptor) if result.entries_read < entries_in_last => {
                let mut writer =
                    SegmentWriter::open(&descriptor.path, WriteMode::Append, descriptor.from_idx)?;
                writer.set_entries_written(result.entries_read);
                if result.error {
                    writer.truncate_to_length(result.last_position)?;
                }
                self.current_writer = Some(writer);
                Ok(())
            }
            _ => self.rotate(self.start_index + total_read),
        }
    }

    /// Closes the active segment and opens a fresh one starting at
    /// `new_start_log_idx`.
    ///
    /// The new segment is allocated by descriptor only; the file grows as
    /// records arrive.
    fn rotate(&mut self, new_start_log_idx: LogIndex) -> ChangelogResult<()> {
        if let Some(writer) = &mut self.current_writer {
            writer.flush()?;
        }

        let descriptor = SegmentDescriptor::new(
            &self.prefix,
            new_start_log_idx,
            new_start_log_idx + self.rotate_interval - 1,
            self.dir.path(),
        );
        let writer = SegmentWriter::open(&descriptor.path, WriteMode::Rewrite, new_start_log_idx)?;

        self.existing_segments
            .insert(descriptor.from_idx, descriptor);
        self.current_writer = Some(writer);
        Ok(())
    }

    /// Persists `entry` at `index` and retains it in memory, rotating first
    /// if the active segment is full.
    ///
    /// Indices are expected to arrive strictly monotonically with stride 1;
    /// overwriting an existing index must go through
    /// [`Changelog::write_at`].
    ///
    /// # Errors
    ///
    /// Returns [`ChangelogError::InvalidOperation`] if the changelog was
    /// never initialized or `index` already has a recorded offset, or an
    /// I/O error from the write.
    pub fn append(
        &mut self,
        index: LogIndex,
        entry: LogEntry,
        force_sync: bool,
    ) -> ChangelogResult<()> {
        if self.writer_mut()?.entries_written() == self.rotate_interval {
            self.rotate(index)?;
        }

        if self.logs.is_empty() {
            self.start_index = index;
        }

        let record = ChangelogRecord::build(index, &entry);
        let offset = self.writer_mut()?.append_record(&record, force_sync)?;

        if self.index_to_offset.insert(index, offset).is_some() {
            return Err(ChangelogError::invalid_operation(format!(
                "record with index {index} already exists"
            )));
        }
        self.logs.insert(index, entry);
        Ok(())
    }

    /// Overwrites the log from `index` onward: everything at and past
    /// `index` is rolled back, on disk and in memory, then `entry` is
    /// appended at `index`.
    ///
    /// This is the Raft follower path for discarding an uncommitted suffix
    /// inherited from a deposed leader. When `index` lies before the active
    /// segment, the rollback crosses segment boundaries: the covering
    /// segment is reopened for appending and every later segment file is
    /// deleted.
    ///
    /// # Errors
    ///
    /// Returns [`ChangelogError::InvalidOperation`] if the changelog does
    /// not hold `index`, or an I/O error from truncation, deletion, or the
    /// final append.
    pub fn write_at(
        &mut self,
        index: LogIndex,
        entry: LogEntry,
        force_sync: bool,
    ) -> ChangelogResult<()> {
        let Some(&truncate_offset) = self.index_to_offset.get(&index) else {
            return Err(ChangelogError::invalid_operation(format!(
                "cannot write at index {index} because changelog doesn't contain it"
            )));
        };

        let need_rollback = index < self.writer_mut()?.start_index();
        if need_rollback {
            let descriptor = self
                .existing_segments
                .range(..=index)
                .next_back()
                .map(|(_, descriptor)| descriptor.clone())
                .ok_or_else(|| {
                    ChangelogError::invalid_operation(format!(
                        "no segment covers index {index}"
                    ))
                })?;

            let mut writer =
                SegmentWriter::open(&descriptor.path, WriteMode::Append, descriptor.from_idx)?;
            writer.set_entries_written(descriptor.expected_entries());
            self.current_writer = Some(writer);
        }

        self.writer_mut()?.truncate_to_length(truncate_offset)?;

        if need_rollback {
            let removed = self.existing_segments.split_off(&(index + 1));
            for descriptor in removed.values() {
                fs::remove_file(&descriptor.path)?;
            }
        }

        // Roll back the in-memory state.
        let removed = self.logs.split_off(&index);
        for idx in removed.keys() {
            self.index_to_offset.remove(idx);
        }

        // The active file was just cut at `index`'s offset, so the records
        // left in it are exactly those below `index` in its range.
        let start_index = self.writer_mut()?.start_index();
        self.writer_mut()?.set_entries_written(index - start_index);

        self.append(index, entry, force_sync)
    }

    /// Drops every entry with index at or below `up_to_log_idx`, deleting
    /// segment files that fall entirely within the range.
    ///
    /// Driven by snapshot progress in the consensus layer. A segment
    /// straddling the boundary is kept whole - segments are never split.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment file cannot be deleted.
    pub fn compact(&mut self, up_to_log_idx: LogIndex) -> ChangelogResult<()> {
        while let Some(descriptor) = self.existing_segments.values().next().cloned() {
            if descriptor.to_idx > up_to_log_idx {
                break;
            }

            for idx in descriptor.from_idx..=descriptor.to_idx {
                if self.index_to_offset.remove(&idx).is_none() {
                    break;
                }
            }
            fs::remove_file(&descriptor.path)?;
            self.existing_segments.remove(&descriptor.from_idx);
        }

        self.logs = self.logs.split_off(&(up_to_log_idx + 1));
        self.start_index = up_to_log_idx + 1;
        Ok(())
    }

    /// First index currently covered by the in-memory log (even when the
    /// log is empty).
    #[must_use]
    pub fn start_index(&self) -> LogIndex {
        self.start_index
    }

    /// Index the next appended entry is expected to carry.
    #[must_use]
    pub fn next_entry_index(&self) -> LogIndex {
        self.start_index + self.logs.len() as u64
    }

    /// Number of entries held in memory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.logs.len()
    }

    /// Whether the log holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    /// The highest-index entry, or the zero-term sentinel when the log is
    /// empty.
    #[must_use]
    pub fn last_entry(&self) -> LogEntry {
        match self.logs.get(&(self.next_entry_index() - 1)) {
            Some(entry) => entry.clone(),
            None => LogEntry::sentinel(),
        }
    }

    /// The entry at `idx`, if the log holds it.
    #[must_use]
    pub fn entry_at(&self, idx: LogIndex) -> Option<LogEntry> {
        self.logs.get(&idx).cloned()
    }

    /// Entries over the half-open range `[start, end)`; absent indices
    /// yield `None` slots.
    #[must_use]
    pub fn entries_between(&self, start: LogIndex, end: LogIndex) -> Vec<Option<LogEntry>> {
        (start..end).map(|idx| self.entry_at(idx)).collect()
    }

    /// Serializes `count` entries starting at `index` for log replication:
    /// an `i32` entry count, then per entry an `i32` size and the entry's
    /// wire form. Integers are little-endian.
    ///
    /// # Errors
    ///
    /// Returns [`ChangelogError::InvalidOperation`] if any required entry
    /// is absent, or [`ChangelogError::InvalidArgument`] if a frame does
    /// not fit the `i32` framing.
    pub fn serialize_entries(&self, index: LogIndex, count: u32) -> ChangelogResult<Vec<u8>> {
        let mut serialized = Vec::with_capacity(count as usize);
        let mut size_total = 0usize;

        for idx in index..index + u64::from(count) {
            let entry = self.logs.get(&idx).ok_or_else(|| {
                ChangelogError::invalid_operation(format!("don't have log entry {idx}"))
            })?;
            let bytes = entry.serialize();
            size_total += bytes.len();
            serialized.push(bytes);
        }

        let mut out = Vec::with_capacity(4 + serialized.len() * 4 + size_total);
        out.extend_from_slice(&frame_len(count as usize)?.to_le_bytes());
        for bytes in &serialized {
            out.extend_from_slice(&frame_len(bytes.len())?.to_le_bytes());
            out.extend_from_slice(bytes);
        }
        Ok(out)
    }

    /// Applies a batch produced by [`Changelog::serialize_entries`],
    /// starting at `index`.
    ///
    /// If the first index is already present the batch overwrites from
    /// there via [`Changelog::write_at`] (rollback semantics); remaining
    /// entries are plain appends.
    ///
    /// # Errors
    ///
    /// Returns [`ChangelogError::Corrupted`] if the buffer does not frame
    /// correctly, or any error the underlying writes produce.
    pub fn apply_from_buffer(
        &mut self,
        index: LogIndex,
        buffer: &[u8],
        force_sync: bool,
    ) -> ChangelogResult<()> {
        let mut pos = 0usize;
        let num_logs = read_frame_len(buffer, &mut pos)?;

        for i in 0..num_logs {
            let cur_idx = index + i;
            let size = read_frame_len(buffer, &mut pos)?;

            let end = pos + size as usize;
            let bytes = buffer.get(pos..end).ok_or_else(|| {
                ChangelogError::corrupted("replication buffer ended inside an entry")
            })?;
            pos = end;

            let entry = LogEntry::deserialize(bytes)?;
            if i == 0 && self.logs.contains_key(&cur_idx) {
                self.write_at(cur_idx, entry, force_sync)?;
            } else {
                self.append(cur_idx, entry, force_sync)?;
            }
        }
        Ok(())
    }

    /// Fsyncs the active segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn flush(&mut self) -> ChangelogResult<()> {
        if let Some(writer) = &mut self.current_writer {
            writer.flush()?;
        }
        Ok(())
    }

    fn writer_mut(&mut self) -> ChangelogResult<&mut SegmentWriter> {
        self.current_writer.as_mut().ok_or_else(|| {
            ChangelogError::invalid_operation(
                "changelog must be initialized before writing records",
            )
        })
    }
}

impl Drop for Changelog {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            error!("cannot flush changelog while closing: {err}");
        }
    }
}

/// Casts a length into the `i32` replication framing.
fn frame_len(len: usize) -> ChangelogResult<i32> {
    i32::try_from(len).map_err(|_| {
        ChangelogError::invalid_argument(format!("length {len} does not fit replication framing"))
    })
}

/// Reads one `i32` frame length, advancing `pos`.
fn read_frame_len(buffer: &[u8], pos: &mut usize) -> ChangelogResult<u64> {
    let end = *pos + 4;
    let bytes = buffer
        .get(*pos..end)
        .ok_or_else(|| ChangelogError::corrupted("replication buffer ended inside a frame"))?;
    *pos = end;

    let value = i32::from_le_bytes(
        bytes
            .try_into()
            .map_err(|_| ChangelogError::corrupted("invalid frame length"))?,
    );
    u64::try_from(value)
        .map_err(|_| ChangelogError::corrupted(format!("negative frame length {value}")))
}
