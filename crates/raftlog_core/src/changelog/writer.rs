//! Segment writer.

use crate::changelog::record::ChangelogRecord;
use crate::entry::LogIndex;
use crate::error::ChangelogResult;
use raftlog_storage::{FileBackend, StorageBackend};
use std::path::Path;

/// How to open a segment file for writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Truncate any existing content. Used on rotation.
    Rewrite,
    /// Keep existing content and append after it. Used when recovery or a
    /// rollback reopens a segment that already holds records.
    Append,
}

/// Appends records to one segment file.
///
/// The writer tracks how many records it has persisted and the index its
/// segment starts at, but not the segment's declared end - rotation is the
/// coordinator's decision, made by comparing [`SegmentWriter::entries_written`]
/// against the rotation interval.
pub struct SegmentWriter {
    backend: Box<dyn StorageBackend>,
    entries_written: u64,
    start_index: LogIndex,
}

impl SegmentWriter {
    /// Opens the segment file at `path` in the given mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path, mode: WriteMode, start_index: LogIndex) -> ChangelogResult<Self> {
        let backend: Box<dyn StorageBackend> = match mode {
            WriteMode::Rewrite => Box::new(FileBackend::create(path)?),
            WriteMode::Append => Box::new(FileBackend::open(path)?),
        };
        Ok(Self::with_backend(backend, start_index))
    }

    /// Creates a writer over an arbitrary backend.
    #[must_use]
    pub fn with_backend(backend: Box<dyn StorageBackend>, start_index: LogIndex) -> Self {
        Self {
            backend,
            entries_written: 0,
            start_index,
        }
    }

    /// Appends a record at the current end of the segment and returns the
    /// byte offset it starts at.
    ///
    /// With `sync` set, the record is fsynced before this returns; without
    /// it the bytes may sit in the OS page cache until the next flush.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or the sync fails.
    pub fn append_record(&mut self, record: &ChangelogRecord, sync: bool) -> ChangelogResult<u64> {
        let offset = self.backend.append(&record.encode())?;
        self.entries_written += 1;

        if sync {
            self.backend.sync()?;
        }
        Ok(offset)
    }

    /// Truncates the segment file to `new_length` bytes; subsequent appends
    /// continue from there.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush or the truncation fails.
    pub fn truncate_to_length(&mut self, new_length: u64) -> ChangelogResult<()> {
        self.backend.flush()?;
        self.backend.truncate(new_length)?;
        Ok(())
    }

    /// Fsyncs the segment file.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn flush(&mut self) -> ChangelogResult<()> {
        self.backend.sync()?;
        Ok(())
    }

    /// Number of records this writer believes its segment holds.
    #[must_use]
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    /// Overrides the record count; used when recovery seeds a reopened tail
    /// segment and when a rollback recomputes the count after truncation.
    pub fn set_entries_written(&mut self, entries_written: u64) {
        self.entries_written = entries_written;
    }

    /// First log index of the segment this writer targets.
    #[must_use]
    pub fn start_index(&self) -> LogIndex {
        self.start_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::LogEntry;
    use bytes::Bytes;
    use raftlog_storage::InMemoryBackend;

    fn record(index: LogIndex, blob: &'static [u8]) -> ChangelogRecord {
        ChangelogRecord::build(index, &LogEntry::new(1, 0, Bytes::from_static(blob)))
    }

    #[test]
    fn append_returns_start_offsets() {
        let mut writer = SegmentWriter::with_backend(Box::new(InMemoryBackend::new()), 1);

        let first = record(1, b"aa");
        let second = record(2, b"b");

        assert_eq!(writer.append_record(&first, false).unwrap(), 0);
        assert_eq!(
            writer.append_record(&second, false).unwrap(),
            first.encode().len() as u64
        );
        assert_eq!(writer.entries_written(), 2);
    }

    #[test]
    fn truncate_then_append_reuses_cut_point() {
        let mut writer = SegmentWriter::with_backend(Box::new(InMemoryBackend::new()), 1);

        writer.append_record(&record(1, b"aa"), false).unwrap();
        let offset = writer.append_record(&record(2, b"bb"), false).unwrap();

        writer.truncate_to_length(offset).unwrap();

        let reappended = writer.append_record(&record(2, b"cc"), false).unwrap();
        assert_eq!(reappended, offset);
    }
}
