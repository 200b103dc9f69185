//! On-disk record format.
//!
//! A segment file is a plain concatenation of records; there is no file
//! header, no magic number, and no footer. Each record is a fixed-layout
//! header followed immediately by the entry blob:
//!
//! ```text
//! ┌─────────────┬───────────┬──────────┬────────────────┬───────────────┬─────────────────┬──────┐
//! │ version (1) │ index (8) │ term (8) │ value_type (1) │ blob_size (8) │ checksum (16)   │ blob │
//! └─────────────┴───────────┴──────────┴────────────────┴───────────────┴─────────────────┴──────┘
//! ```
//!
//! Integers are little-endian. The checksum is XXH3-128 over the blob
//! bytes, stored as the 128-bit value little-endian (low half first); an
//! empty blob checksums to zero. Putting the checksum in the header rather
//! than a trailer lets the reader learn the expected value before the blob
//! arrives, so a torn tail (short read) stays distinguishable from
//! corruption (full read, wrong hash).
//!
//! The checksum algorithm is part of the format: replacing it requires a
//! new version byte.

use crate::entry::{LogEntry, LogIndex};
use crate::error::{ChangelogError, ChangelogResult};
use bytes::Bytes;
use xxhash_rust::xxh3::xxh3_128;

/// Serialized header size:
/// version (1) + index (8) + term (8) + value_type (1) + blob_size (8) +
/// blob_checksum (16) = 42 bytes.
pub const HEADER_SIZE: usize = 42;

/// On-disk format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordVersion {
    /// The initial (and only) format.
    V0 = 0,
}

impl RecordVersion {
    /// Converts a byte to a version.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::V0),
            _ => None,
        }
    }

    /// Converts the version to its on-disk byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Computes the 128-bit checksum of a record blob.
#[must_use]
pub fn blob_checksum(blob: &[u8]) -> u128 {
    if blob.is_empty() {
        0
    } else {
        xxh3_128(blob)
    }
}

/// Fixed-layout header preceding every blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Format version of this record.
    pub version: RecordVersion,
    /// Raft index of the entry.
    pub index: LogIndex,
    /// Raft term of the entry.
    pub term: u64,
    /// Opaque value type tag.
    pub value_type: u8,
    /// Length of the blob that follows, in bytes.
    pub blob_size: u64,
    /// XXH3-128 of the blob, zero when the blob is empty.
    pub blob_checksum: u128,
}

impl RecordHeader {
    /// Appends the serialized header to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.version.as_byte());
        buf.extend_from_slice(&self.index.to_le_bytes());
        buf.extend_from_slice(&self.term.to_le_bytes());
        buf.push(self.value_type);
        buf.extend_from_slice(&self.blob_size.to_le_bytes());
        buf.extend_from_slice(&self.blob_checksum.to_le_bytes());
    }

    /// Decodes a header from exactly [`HEADER_SIZE`] leading bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ChangelogError::Corrupted`] if `bytes` is too short and
    /// [`ChangelogError::UnknownFormatVersion`] for an unrecognized
    /// version byte.
    pub fn decode(bytes: &[u8]) -> ChangelogResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(ChangelogError::corrupted(format!(
                "record header too short: {} bytes",
                bytes.len()
            )));
        }

        let version = RecordVersion::from_byte(bytes[0])
            .ok_or(ChangelogError::UnknownFormatVersion { version: bytes[0] })?;

        let read_u64 = |range: std::ops::Range<usize>| -> ChangelogResult<u64> {
            Ok(u64::from_le_bytes(
                bytes[range]
                    .try_into()
                    .map_err(|_| ChangelogError::corrupted("invalid u64 in record header"))?,
            ))
        };

        Ok(Self {
            version,
            index: read_u64(1..9)?,
            term: read_u64(9..17)?,
            value_type: bytes[17],
            blob_size: read_u64(18..26)?,
            blob_checksum: u128::from_le_bytes(
                bytes[26..42]
                    .try_into()
                    .map_err(|_| ChangelogError::corrupted("invalid checksum in record header"))?,
            ),
        })
    }

    /// Verifies that `blob` hashes to the checksum stored in the header.
    ///
    /// # Errors
    ///
    /// Returns [`ChangelogError::ChecksumMismatch`] on disagreement.
    pub fn verify_blob(&self, blob: &[u8]) -> ChangelogResult<()> {
        let actual = blob_checksum(blob);
        if actual != self.blob_checksum {
            return Err(ChangelogError::ChecksumMismatch {
                expected: self.blob_checksum,
                actual,
            });
        }
        Ok(())
    }
}

/// A header plus the blob it describes, ready for the segment writer.
#[derive(Debug, Clone)]
pub struct ChangelogRecord {
    /// The record header.
    pub header: RecordHeader,
    /// The entry blob; shares storage with the in-memory entry.
    pub blob: Bytes,
}

impl ChangelogRecord {
    /// Builds the record persisting `entry` at `index`.
    #[must_use]
    pub fn build(index: LogIndex, entry: &LogEntry) -> Self {
        Self {
            header: RecordHeader {
                version: RecordVersion::V0,
                index,
                term: entry.term,
                value_type: entry.value_type,
                blob_size: entry.blob.len() as u64,
                blob_checksum: blob_checksum(&entry.blob),
            },
            blob: entry.blob.clone(),
        }
    }

    /// Serializes the whole record: header, then blob, no delimiters.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.blob.len());
        self.header.encode_into(&mut out);
        out.extend_from_slice(&self.blob);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> LogEntry {
        LogEntry::new(3, 1, Bytes::from_static(b"consensus payload"))
    }

    #[test]
    fn header_roundtrip() {
        let record = ChangelogRecord::build(42, &sample_entry());
        let encoded = record.encode();
        assert_eq!(encoded.len(), HEADER_SIZE + 17);

        let header = RecordHeader::decode(&encoded).unwrap();
        assert_eq!(header, record.header);
        assert_eq!(header.index, 42);
        assert_eq!(header.term, 3);
        assert_eq!(header.value_type, 1);
        assert_eq!(header.blob_size, 17);
    }

    #[test]
    fn empty_blob_checksums_to_zero() {
        let entry = LogEntry::new(1, 0, Bytes::new());
        let record = ChangelogRecord::build(1, &entry);
        assert_eq!(record.header.blob_checksum, 0);
        assert_eq!(record.encode().len(), HEADER_SIZE);
    }

    #[test]
    fn unknown_version_byte_rejected() {
        let mut encoded = ChangelogRecord::build(1, &sample_entry()).encode();
        encoded[0] = 9;
        assert!(matches!(
            RecordHeader::decode(&encoded),
            Err(ChangelogError::UnknownFormatVersion { version: 9 })
        ));
    }

    #[test]
    fn short_header_rejected() {
        let encoded = ChangelogRecord::build(1, &sample_entry()).encode();
        assert!(matches!(
            RecordHeader::decode(&encoded[..HEADER_SIZE - 1]),
            Err(ChangelogError::Corrupted { .. })
        ));
    }

    #[test]
    fn verify_blob_detects_flipped_bit() {
        let record = ChangelogRecord::build(1, &sample_entry());
        let mut blob = record.blob.to_vec();
        blob[0] ^= 0x01;

        assert!(record.header.verify_blob(&record.blob).is_ok());
        assert!(matches!(
            record.header.verify_blob(&blob),
            Err(ChangelogError::ChecksumMismatch { .. })
        ));
    }
}
