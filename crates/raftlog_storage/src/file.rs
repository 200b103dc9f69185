//! File-based storage backend for segment files.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// One changelog segment file on disk.
///
/// The backend tracks the file length and the OS cursor position itself.
/// The changelog's access patterns make the cursor bookkeeping pay off:
/// recovery reads a segment front to back and appends always land at the
/// end, so consecutive operations usually find the cursor already where
/// they need it and skip the seek. After a failed read or write the cursor
/// is treated as unknown and the next operation seeks unconditionally.
///
/// Two constructors match the two ways a segment comes into existence:
///
/// - [`FileBackend::create`] truncates any existing file. Used when the
///   changelog rotates to a fresh segment.
/// - [`FileBackend::open`] keeps whatever a previous process managed to
///   write. Used when recovery scans a segment or reopens a torn tail for
///   further appends.
///
/// # Durability
///
/// Nothing is buffered in the process, so `flush()` has no work to do;
/// `sync()` is a full fsync. Truncation syncs immediately - a rollback
/// that is not durable is no rollback at all.
#[derive(Debug)]
pub struct FileBackend {
    file: File,
    /// Bytes currently in the file.
    len: u64,
    /// Where the OS cursor sits, or `None` after a failed operation.
    cursor: Option<u64>,
}

impl FileBackend {
    /// Creates the file, truncating any previous content.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            file,
            len: 0,
            cursor: Some(0),
        })
    }

    /// Opens an existing file without truncating, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its length read.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            file,
            len,
            cursor: Some(0),
        })
    }

    /// Positions the OS cursor at `target`, seeking only when it is not
    /// known to be there already.
    fn position_at(&mut self, target: u64) -> StorageResult<()> {
        if self.cursor != Some(target) {
            self.cursor = None;
            self.file.seek(SeekFrom::Start(target))?;
            self.cursor = Some(target);
        }
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        let wanted = buf.len() as u64;
        match offset.checked_add(wanted) {
            Some(end) if end <= self.len => {}
            _ => {
                return Err(StorageError::ReadPastEnd {
                    offset,
                    requested: buf.len(),
                    len: self.len,
                })
            }
        }
        if buf.is_empty() {
            return Ok(());
        }

        self.position_at(offset)?;
        match self.file.read_exact(buf) {
            Ok(()) => {
                self.cursor = Some(offset + wanted);
                Ok(())
            }
            Err(err) => {
                self.cursor = None;
                Err(err.into())
            }
        }
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.len;
        if data.is_empty() {
            return Ok(offset);
        }

        self.position_at(offset)?;
        match self.file.write_all(data) {
            Ok(()) => {
                self.len = offset + data.len() as u64;
                self.cursor = Some(self.len);
                Ok(offset)
            }
            Err(err) => {
                // A partial record may be on disk now; the caller treats
                // this as fatal, and recovery will cut the torn bytes.
                self.cursor = None;
                Err(err.into())
            }
        }
    }

    fn flush(&mut self) -> StorageResult<()> {
        // Writes go straight to the file descriptor.
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_len: u64) -> StorageResult<()> {
        if new_len > self.len {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_len,
                len: self.len,
            });
        }

        self.cursor = None;
        self.file.set_len(new_len)?;
        self.file.sync_all()?;
        self.len = new_len;

        // Park the cursor at the new end, where the next append lands.
        self.file.seek(SeekFrom::Start(new_len))?;
        self.cursor = Some(new_len);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn read_vec(backend: &mut FileBackend, offset: u64, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        backend.read_exact_at(offset, &mut buf).unwrap();
        buf
    }

    #[test]
    fn create_truncates_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("segment.bin");

        std::fs::write(&path, b"stale bytes").unwrap();

        let backend = FileBackend::create(&path).unwrap();
        assert_eq!(backend.len(), 0);
    }

    #[test]
    fn open_preserves_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("segment.bin");

        std::fs::write(&path, b"recovered tail").unwrap();

        let mut backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.len(), 14);

        assert_eq!(backend.append(b"!").unwrap(), 14);
        assert_eq!(read_vec(&mut backend, 0, 15), b"recovered tail!");
    }

    #[test]
    fn interleaved_reads_and_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("segment.bin");

        let mut backend = FileBackend::create(&path).unwrap();

        assert_eq!(backend.append(b"hello").unwrap(), 0);
        assert_eq!(read_vec(&mut backend, 0, 5), b"hello");

        // Append after a read has moved the cursor away from the end.
        assert_eq!(backend.append(b" world").unwrap(), 5);
        assert_eq!(backend.len(), 11);

        // Sequential reads, then a backwards one.
        assert_eq!(read_vec(&mut backend, 0, 5), b"hello");
        assert_eq!(read_vec(&mut backend, 5, 6), b" world");
        assert_eq!(read_vec(&mut backend, 4, 3), b"o w");
    }

    #[test]
    fn read_past_end_fails_without_touching_buf() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("segment.bin");

        let mut backend = FileBackend::create(&path).unwrap();
        backend.append(b"hello").unwrap();

        let mut buf = [0xAAu8; 10];
        let result = backend.read_exact_at(3, &mut buf);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
        assert_eq!(buf, [0xAAu8; 10]);
    }

    #[test]
    fn truncate_then_append_continues_from_new_end() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("segment.bin");

        let mut backend = FileBackend::create(&path).unwrap();
        backend.append(b"hello world").unwrap();

        backend.truncate(5).unwrap();
        assert_eq!(backend.len(), 5);

        assert_eq!(backend.append(b"!").unwrap(), 5);
        assert_eq!(read_vec(&mut backend, 0, 6), b"hello!");
    }

    #[test]
    fn truncate_cannot_grow_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("segment.bin");

        let mut backend = FileBackend::create(&path).unwrap();
        backend.append(b"hello").unwrap();

        assert!(matches!(
            backend.truncate(100),
            Err(StorageError::TruncateBeyondEnd {
                requested: 100,
                len: 5
            })
        ));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("segment.bin");

        {
            let mut backend = FileBackend::create(&path).unwrap();
            backend.append(b"durable").unwrap();
            backend.sync().unwrap();
        }

        let mut backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.len(), 7);
        assert_eq!(read_vec(&mut backend, 0, 7), b"durable");
    }
}
