//! Segment reader.
//!
//! Recovery scans every segment from the front and has to distinguish two
//! very different situations at the point where a scan stops:
//!
//! - a **torn tail** - the process died mid-write and the last record is
//!   incomplete. Expected after any crash; the coordinator truncates it
//!   away and resumes appending.
//! - **corruption** - a checksum mismatch, a skipped or duplicated index,
//!   an unknown version byte. Everything from the failed record onward is
//!   untrustworthy.
//!
//! Either way the scan must not abort recovery of the preceding segments,
//! so the reader never raises: failures are captured in
//! [`ReadResult::error`] with [`ReadResult::last_position`] pointing at the
//! start of the failed record - the truncation point that yields a clean
//! prefix.

use crate::changelog::record::{RecordHeader, HEADER_SIZE};
use crate::entry::{LogEntry, LogIndex};
use crate::error::{ChangelogError, ChangelogResult};
use bytes::Bytes;
use raftlog_storage::{FileBackend, StorageBackend};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::warn;

/// Outcome of scanning one segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadResult {
    /// Records decoded and validated, including ones below the requested
    /// start index.
    pub entries_read: u64,
    /// Byte offset of the record the scan stopped at; when `error` is set,
    /// truncating the file to this length removes the failed suffix.
    pub last_position: u64,
    /// Whether the scan stopped on a failure rather than clean end of file.
    pub error: bool,
}

/// Stream-decodes one segment file from the beginning.
pub struct SegmentReader {
    backend: Box<dyn StorageBackend>,
    name: String,
}

impl SegmentReader {
    /// Opens the segment file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> ChangelogResult<Self> {
        Ok(Self {
            backend: Box::new(FileBackend::open(path)?),
            name: path.display().to_string(),
        })
    }

    /// Creates a reader over an arbitrary backend.
    #[must_use]
    pub fn with_backend(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend,
            name: "<memory>".to_string(),
        }
    }

    /// Scans the segment, inserting every valid record with index at or
    /// above `start_log_idx` into `logs` and its byte offset into
    /// `index_to_offset`. Records below `start_log_idx` are validated and
    /// counted but discarded.
    ///
    /// Failures stop the scan and are reported through the result, not
    /// raised; see the module docs.
    pub fn read_into(
        &mut self,
        logs: &mut BTreeMap<LogIndex, LogEntry>,
        start_log_idx: LogIndex,
        index_to_offset: &mut HashMap<LogIndex, u64>,
    ) -> ReadResult {
        let mut result = ReadResult::default();

        let end_of_segment = self.backend.len();
        let mut previous_index: LogIndex = 0;
        let mut position = 0u64;

        while position < end_of_segment {
            result.last_position = position;

            match self.read_one(position, &mut previous_index, logs) {
                Ok((header, blob, next_position)) => {
                    result.entries_read += 1;
                    if header.index >= start_log_idx {
                        logs.insert(
                            header.index,
                            LogEntry::new(header.term, header.value_type, blob),
                        );
                        index_to_offset.insert(header.index, position);
                    }
                    position = next_position;
                }
                Err(err) => {
                    warn!(
                        "cannot completely read changelog segment {}: {err}",
                        self.name
                    );
                    result.error = true;
                    break;
                }
            }
        }

        result
    }

    /// Reads and validates the record starting at `position`.
    fn read_one(
        &mut self,
        position: u64,
        previous_index: &mut LogIndex,
        logs: &BTreeMap<LogIndex, LogEntry>,
    ) -> ChangelogResult<(RecordHeader, Bytes, u64)> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        self.backend.read_exact_at(position, &mut header_bytes)?;
        let header = RecordHeader::decode(&header_bytes)?;

        // Check the declared blob against the bytes actually left in the
        // file before allocating; a torn tail can leave a header whose
        // size field is garbage.
        let blob_start = position + HEADER_SIZE as u64;
        let available = self.backend.len().saturating_sub(blob_start);
        if header.blob_size > available {
            return Err(ChangelogError::corrupted(format!(
                "record at offset {position} declares a {} byte blob but only {available} bytes remain",
                header.blob_size
            )));
        }

        let mut blob = vec![0u8; header.blob_size as usize];
        self.backend.read_exact_at(blob_start, &mut blob)?;

        if *previous_index != 0 && *previous_index + 1 != header.index {
            return Err(ChangelogError::corrupted(format!(
                "previous log entry {previous_index}, next log entry {}, seems like some entries skipped",
                header.index
            )));
        }
        *previous_index = header.index;

        header.verify_blob(&blob)?;

        if logs.contains_key(&header.index) {
            return Err(ChangelogError::corrupted(format!(
                "duplicated index {} in segment {}",
                header.index, self.name
            )));
        }

        let next_position = position + HEADER_SIZE as u64 + header.blob_size;
        Ok((header, Bytes::from(blob), next_position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::record::ChangelogRecord;
    use raftlog_storage::InMemoryBackend;

    fn encode_records(entries: &[(LogIndex, &'static [u8])]) -> Vec<u8> {
        let mut data = Vec::new();
        for &(index, blob) in entries {
            let entry = LogEntry::new(index * 10, 0, Bytes::from_static(blob));
            data.extend_from_slice(&ChangelogRecord::build(index, &entry).encode());
        }
        data
    }

    fn read_all(data: Vec<u8>, start_log_idx: LogIndex) -> (BTreeMap<LogIndex, LogEntry>, HashMap<LogIndex, u64>, ReadResult) {
        let mut logs = BTreeMap::new();
        let mut offsets = HashMap::new();
        let mut reader =
            SegmentReader::with_backend(Box::new(InMemoryBackend::with_data(data)));
        let result = reader.read_into(&mut logs, start_log_idx, &mut offsets);
        (logs, offsets, result)
    }

    #[test]
    fn empty_segment_reads_cleanly() {
        let (logs, offsets, result) = read_all(Vec::new(), 0);
        assert!(logs.is_empty());
        assert!(offsets.is_empty());
        assert_eq!(result.entries_read, 0);
        assert!(!result.error);
    }

    #[test]
    fn reads_contiguous_records_with_offsets() {
        let data = encode_records(&[(1, b"a"), (2, b"bb"), (3, b"ccc")]);
        let (logs, offsets, result) = read_all(data, 0);

        assert_eq!(result.entries_read, 3);
        assert!(!result.error);
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[&2].blob.as_ref(), b"bb");
        assert_eq!(logs[&2].term, 20);

        assert_eq!(offsets[&1], 0);
        assert_eq!(offsets[&2], (HEADER_SIZE + 1) as u64);
        assert_eq!(offsets[&3], (2 * HEADER_SIZE + 3) as u64);
    }

    #[test]
    fn entries_below_start_are_counted_but_discarded() {
        let data = encode_records(&[(1, b"a"), (2, b"b"), (3, b"c")]);
        let (logs, offsets, result) = read_all(data, 3);

        assert_eq!(result.entries_read, 3);
        assert_eq!(logs.len(), 1);
        assert!(logs.contains_key(&3));
        assert_eq!(offsets.len(), 1);
    }

    #[test]
    fn torn_header_stops_at_record_start() {
        let mut data = encode_records(&[(1, b"a"), (2, b"b")]);
        let cut = data.len() as u64;
        data.extend_from_slice(&[0u8; 5]);

        let (logs, _, result) = read_all(data, 0);
        assert!(result.error);
        assert_eq!(result.entries_read, 2);
        assert_eq!(result.last_position, cut);
        assert_eq!(logs.len(), 2);
    }

    #[test]
    fn torn_blob_stops_at_record_start() {
        let mut data = encode_records(&[(1, b"a")]);
        let cut = data.len() as u64;
        let torn = encode_records(&[(2, b"full blob")]);
        data.extend_from_slice(&torn[..torn.len() - 4]);

        let (logs, _, result) = read_all(data, 0);
        assert!(result.error);
        assert_eq!(result.entries_read, 1);
        assert_eq!(result.last_position, cut);
        assert_eq!(logs.len(), 1);
    }

    #[test]
    fn flipped_blob_bit_stops_scan() {
        let mut data = encode_records(&[(1, b"a"), (2, b"bb"), (3, b"ccc")]);
        let second_blob_at = 2 * HEADER_SIZE + 1;
        data[second_blob_at] ^= 0x40;

        let (logs, _, result) = read_all(data, 0);
        assert!(result.error);
        assert_eq!(result.entries_read, 1);
        assert_eq!(result.last_position, (HEADER_SIZE + 1) as u64);
        assert_eq!(logs.len(), 1);
        assert!(logs.contains_key(&1));
    }

    #[test]
    fn skipped_index_stops_scan() {
        let data = encode_records(&[(1, b"a"), (3, b"c")]);
        let (logs, _, result) = read_all(data, 0);

        assert!(result.error);
        assert_eq!(result.entries_read, 1);
        assert_eq!(logs.len(), 1);
    }

    #[test]
    fn index_duplicated_across_segments_stops_scan() {
        // The in-memory maps are shared across the per-segment scans, which
        // is what lets a second segment re-declaring an index get caught.
        let mut logs = BTreeMap::new();
        let mut offsets = HashMap::new();

        let mut first = SegmentReader::with_backend(Box::new(InMemoryBackend::with_data(
            encode_records(&[(1, b"a"), (2, b"b")]),
        )));
        let result = first.read_into(&mut logs, 0, &mut offsets);
        assert!(!result.error);

        let mut second = SegmentReader::with_backend(Box::new(InMemoryBackend::with_data(
            encode_records(&[(2, b"again"), (3, b"c")]),
        )));
        let result = second.read_into(&mut logs, 0, &mut offsets);

        assert!(result.error);
        assert_eq!(result.entries_read, 0);
        assert_eq!(logs[&2].blob.as_ref(), b"b");
    }
}
