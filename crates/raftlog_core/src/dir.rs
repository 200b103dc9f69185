//! Changelog directory management.
//!
//! Layout on disk:
//!
//! ```text
//! <dir>/
//! ├─ LOCK                    # advisory lock, single writer per directory
//! ├─ changelog_1_100.bin     # segment files, one per index range
//! ├─ changelog_101_200.bin
//! └─ ...
//! ```
//!
//! The changelog is single-writer by contract; the `LOCK` file turns a
//! second process opening the same directory from silent log corruption
//! into an immediate error.

use crate::changelog::SegmentDescriptor;
use crate::entry::LogIndex;
use crate::error::{ChangelogError, ChangelogResult};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Name of the advisory lock file.
const LOCK_FILE: &str = "LOCK";

/// An exclusively locked changelog directory.
#[derive(Debug)]
pub struct ChangelogDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle, held for the lifetime of the changelog.
    _lock_file: File,
}

impl ChangelogDir {
    /// Opens the directory, creating it if absent, and takes the exclusive
    /// lock.
    ///
    /// # Errors
    ///
    /// Returns [`ChangelogError::DirectoryLocked`] if another changelog
    /// instance holds the lock, [`ChangelogError::InvalidArgument`] if the
    /// path exists but is not a directory, or an I/O error.
    pub fn open(path: &Path) -> ChangelogResult<Self> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(ChangelogError::invalid_argument(format!(
                "changelog path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(ChangelogError::DirectoryLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Enumerates the segment files, keyed by their first log index.
    ///
    /// The listing is authoritative: whatever parses is a segment, and any
    /// other regular file (the lock aside) is corruption.
    ///
    /// # Errors
    ///
    /// Returns [`ChangelogError::Corrupted`] for an unparsable filename, or
    /// an I/O error from the directory walk.
    pub fn scan(&self) -> ChangelogResult<BTreeMap<LogIndex, SegmentDescriptor>> {
        let mut segments = BTreeMap::new();

        for dir_entry in fs::read_dir(&self.path)? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() || dir_entry.file_name() == LOCK_FILE {
                continue;
            }

            let descriptor = SegmentDescriptor::from_path(&dir_entry.path())?;
            segments.insert(descriptor.from_idx, descriptor);
        }

        Ok(segments)
    }
}
