//! In-memory storage backend for tests.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};

/// A `Vec<u8>` backed store.
///
/// Used by unit tests that exercise the record codec, writer, and reader
/// without touching the filesystem. [`InMemoryBackend::with_data`] and
/// [`InMemoryBackend::data`] let crash and corruption scenarios be staged
/// byte by byte. Exclusive ownership makes this a plain vector, nothing
/// more.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: Vec<u8>,
}

impl InMemoryBackend {
    /// Creates a new empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-filled with `data`, as if those bytes had been
    /// appended and synced before a crash.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// The stored bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        let stored = match offset.checked_add(buf.len() as u64) {
            Some(end) if end <= self.data.len() as u64 => {
                &self.data[offset as usize..end as usize]
            }
            _ => {
                return Err(StorageError::ReadPastEnd {
                    offset,
                    requested: buf.len(),
                    len: self.data.len() as u64,
                })
            }
        };
        buf.copy_from_slice(stored);
        Ok(())
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.data.len() as u64;
        self.data.extend_from_slice(data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_len: u64) -> StorageResult<()> {
        if new_len > self.data.len() as u64 {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_len,
                len: self.data.len() as u64,
            });
        }
        self.data.truncate(new_len as usize);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_vec(backend: &mut InMemoryBackend, offset: u64, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        backend.read_exact_at(offset, &mut buf).unwrap();
        buf
    }

    #[test]
    fn append_returns_offsets() {
        let mut backend = InMemoryBackend::new();

        assert_eq!(backend.append(b"hello").unwrap(), 0);
        assert_eq!(backend.append(b" world").unwrap(), 5);
        assert_eq!(backend.len(), 11);
    }

    #[test]
    fn read_exact_at_returns_written_bytes() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"hello world").unwrap();

        assert_eq!(read_vec(&mut backend, 0, 5), b"hello");
        assert_eq!(read_vec(&mut backend, 6, 5), b"world");
    }

    #[test]
    fn read_past_end_fails() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"hello").unwrap();

        let mut buf = [0u8; 10];
        assert!(matches!(
            backend.read_exact_at(3, &mut buf),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn with_data_seeds_content() {
        let mut backend = InMemoryBackend::with_data(b"preloaded".to_vec());
        assert_eq!(backend.len(), 9);
        assert_eq!(read_vec(&mut backend, 0, 9), b"preloaded");
    }

    #[test]
    fn truncate_discards_tail() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"hello world").unwrap();

        backend.truncate(5).unwrap();
        assert_eq!(backend.len(), 5);
        assert_eq!(backend.data(), b"hello");

        assert!(matches!(
            backend.truncate(100),
            Err(StorageError::TruncateBeyondEnd { .. })
        ));
    }
}
