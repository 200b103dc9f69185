//! Log entry definitions.

use crate::error::{ChangelogError, ChangelogResult};
use bytes::Bytes;

/// Raft-assigned position of an entry in the log.
///
/// Indices are strictly monotonic starting at 1; index 0 is reserved to mean
/// "no entry".
pub type LogIndex = u64;

/// Size of the fixed part of an entry's wire form:
/// term (8) + value_type (1) = 9 bytes.
const ENTRY_WIRE_HEADER: usize = 9;

/// One consensus log entry.
///
/// The changelog treats entries as opaque: the term, value type, and blob
/// come from the Raft layer and are persisted and returned verbatim. The
/// blob is immutable after construction and reference-counted, so `Clone`
/// shares the bytes instead of copying them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Raft term the entry was created in.
    pub term: u64,
    /// Raft value type tag, opaque to the changelog.
    pub value_type: u8,
    /// Entry payload.
    pub blob: Bytes,
}

impl LogEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(term: u64, value_type: u8, blob: Bytes) -> Self {
        Self {
            term,
            value_type,
            blob,
        }
    }

    /// The entry returned in place of a last entry when the log is empty:
    /// term 0 and a zeroed blob of machine word size.
    ///
    /// Callers key off the zero term; the blob length is part of the
    /// contract with the consensus layer and must not change.
    #[must_use]
    pub fn sentinel() -> Self {
        Self {
            term: 0,
            value_type: 0,
            blob: Bytes::from(vec![0u8; std::mem::size_of::<usize>()]),
        }
    }

    /// Serializes the entry into the wire form used by bulk replication
    /// transfer: term, value type, then the raw blob.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENTRY_WIRE_HEADER + self.blob.len());
        out.extend_from_slice(&self.term.to_le_bytes());
        out.push(self.value_type);
        out.extend_from_slice(&self.blob);
        out
    }

    /// Deserializes an entry from its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`ChangelogError::Corrupted`] if `bytes` is shorter than the
    /// fixed entry header.
    pub fn deserialize(bytes: &[u8]) -> ChangelogResult<Self> {
        if bytes.len() < ENTRY_WIRE_HEADER {
            return Err(ChangelogError::corrupted(format!(
                "serialized entry too short: {} bytes",
                bytes.len()
            )));
        }

        let term = u64::from_le_bytes(
            bytes[0..8]
                .try_into()
                .map_err(|_| ChangelogError::corrupted("invalid term"))?,
        );
        let value_type = bytes[8];
        let blob = Bytes::copy_from_slice(&bytes[ENTRY_WIRE_HEADER..]);

        Ok(Self {
            term,
            value_type,
            blob,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_roundtrip() {
        let entry = LogEntry::new(7, 1, Bytes::from_static(b"payload"));
        let decoded = LogEntry::deserialize(&entry.serialize()).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn wire_roundtrip_empty_blob() {
        let entry = LogEntry::new(3, 2, Bytes::new());
        let decoded = LogEntry::deserialize(&entry.serialize()).unwrap();
        assert_eq!(decoded, entry);
        assert!(decoded.blob.is_empty());
    }

    #[test]
    fn deserialize_rejects_short_input() {
        let result = LogEntry::deserialize(&[0u8; 8]);
        assert!(matches!(result, Err(ChangelogError::Corrupted { .. })));
    }

    #[test]
    fn sentinel_is_zeroed_word() {
        let sentinel = LogEntry::sentinel();
        assert_eq!(sentinel.term, 0);
        assert_eq!(sentinel.blob.len(), std::mem::size_of::<usize>());
        assert!(sentinel.blob.iter().all(|&b| b == 0));
    }

    #[test]
    fn clone_shares_blob() {
        let entry = LogEntry::new(1, 0, Bytes::from_static(b"shared"));
        let clone = entry.clone();
        assert_eq!(clone.blob.as_ptr(), entry.blob.as_ptr());
    }
}
