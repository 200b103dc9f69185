//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level byte store holding one changelog segment.
///
/// Backends are **opaque byte stores**: they never interpret record
/// headers, checksums, or entry payloads. The changelog drives them with
/// three motions - append at the end, read back from a known offset,
/// truncate the tail - and always through exactly one owner: a segment is
/// held by one writer *or* one reader, never both, and never by two
/// threads. That exclusivity is why every operation takes `&mut self` and
/// why implementations carry no interior locking.
///
/// Reads fill a caller-provided buffer rather than allocating one: the
/// segment reader sizes the buffer from the record header it just decoded,
/// and a short file is reported as an error instead of a partial read.
///
/// # Invariants
///
/// - `append` returns the offset the data landed at, which is `len()`
///   before the call
/// - `read_exact_at` either fills the whole buffer with previously written
///   bytes or fails without a partial result
/// - `sync` makes everything appended so far durable
/// - `truncate` discards bytes at and after `new_len`; subsequent appends
///   continue from the new end
pub trait StorageBackend: Send {
    /// Fills `buf` with the bytes stored at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if any of the requested
    /// range was never written, or an I/O error.
    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> StorageResult<()>;

    /// Appends data at the current end and returns the offset it was
    /// written at.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes any buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Syncs data and metadata to durable storage (fsync).
    ///
    /// After this returns, every appended byte survives process or machine
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Truncates the store to `new_len` bytes.
    ///
    /// Used to chop a torn record off a recovered tail segment and to roll
    /// back overwritten Raft suffixes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::TruncateBeyondEnd`] if `new_len`
    /// exceeds the current length, or an I/O error.
    fn truncate(&mut self, new_len: u64) -> StorageResult<()>;

    /// Current length in bytes (the offset of the next append).
    ///
    /// Length is tracked state, not a syscall, so this cannot fail.
    fn len(&self) -> u64;
}
