//! Error types for the changelog.

use std::io;
use thiserror::Error;

/// Result type for changelog operations.
pub type ChangelogResult<T> = Result<T, ChangelogError>;

/// Errors that can occur in changelog operations.
///
/// Reader-level failures during recovery (torn records, checksum mismatches
/// in the tail) are deliberately *not* surfaced through this enum - the
/// segment reader captures them as data so the coordinator can truncate the
/// torn suffix. Everything else propagates to the caller unchanged.
#[derive(Debug, Error)]
pub enum ChangelogError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] raftlog_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record carries a version byte this build does not know.
    #[error("unknown changelog format version {version}")]
    UnknownFormatVersion {
        /// The unrecognized version byte.
        version: u8,
    },

    /// On-disk state is malformed: unparsable segment filename, skipped or
    /// duplicated index, or a replication buffer that does not frame
    /// correctly.
    #[error("corrupted changelog: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// A record blob hashes to something other than its header claims.
    #[error("checksum mismatch: expected {expected:032x}, got {actual:032x}")]
    ChecksumMismatch {
        /// Checksum stored in the record header.
        expected: u128,
        /// Checksum computed over the blob that was read.
        actual: u128,
    },

    /// API misuse: appending before initialization, overwriting an offset,
    /// writing at an index the changelog does not hold, serializing a
    /// missing entry.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the argument issue.
        message: String,
    },

    /// Another changelog instance holds the directory lock.
    #[error("changelog directory locked: another instance has exclusive access")]
    DirectoryLocked,
}

impl ChangelogError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
