//! Error types for storage backends.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur inside a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read asked for bytes the store does not hold.
    #[error("short read: {requested} bytes at offset {offset}, but only {len} bytes stored")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// How many bytes the read asked for.
        requested: usize,
        /// How many bytes the store holds in total.
        len: u64,
    },

    /// A truncation asked to *grow* the store.
    #[error("cannot truncate {len} bytes up to {requested}")]
    TruncateBeyondEnd {
        /// The requested new length.
        requested: u64,
        /// The current length.
        len: u64,
    },
}
