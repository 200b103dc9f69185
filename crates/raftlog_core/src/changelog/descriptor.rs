//! Segment file naming.
//!
//! The directory listing is the only metadata the changelog keeps: there is
//! no manifest, no index file. Everything recovery needs to know about a
//! segment before opening it - which index range it was created to hold -
//! is carried by its filename, `{prefix}_{from_idx}_{to_idx}.bin`.

use crate::entry::LogIndex;
use crate::error::{ChangelogError, ChangelogResult};
use std::path::{Path, PathBuf};

/// Extension of every segment file.
pub const SEGMENT_EXTENSION: &str = "bin";

/// Describes one segment file.
///
/// The range `[from_idx, to_idx]` is what the segment was created to hold;
/// after a crash the file may contain fewer records, never more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDescriptor {
    /// Filename prefix the segment was created with.
    pub prefix: String,
    /// First log index the segment holds.
    pub from_idx: LogIndex,
    /// Last log index the segment was allocated for.
    pub to_idx: LogIndex,
    /// Location of the segment file.
    pub path: PathBuf,
}

impl SegmentDescriptor {
    /// Creates a descriptor for a new segment under `dir`.
    #[must_use]
    pub fn new(prefix: &str, from_idx: LogIndex, to_idx: LogIndex, dir: &Path) -> Self {
        let path = dir.join(format!("{prefix}_{from_idx}_{to_idx}.{SEGMENT_EXTENSION}"));
        Self {
            prefix: prefix.to_string(),
            from_idx,
            to_idx,
            path,
        }
    }

    /// Parses a descriptor back out of a segment file path.
    ///
    /// # Errors
    ///
    /// Returns [`ChangelogError::Corrupted`] if the stem does not split on
    /// `_` into a prefix and two indices.
    pub fn from_path(path: &Path) -> ChangelogResult<Self> {
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| invalid_segment_name(path))?;

        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() < 3 {
            return Err(invalid_segment_name(path));
        }

        let from_idx = parts[1]
            .parse::<LogIndex>()
            .map_err(|_| invalid_segment_name(path))?;
        let to_idx = parts[2]
            .parse::<LogIndex>()
            .map_err(|_| invalid_segment_name(path))?;

        Ok(Self {
            prefix: parts[0].to_string(),
            from_idx,
            to_idx,
            path: path.to_path_buf(),
        })
    }

    /// Number of records a whole segment of this range holds.
    #[must_use]
    pub fn expected_entries(&self) -> u64 {
        self.to_idx - self.from_idx + 1
    }
}

fn invalid_segment_name(path: &Path) -> ChangelogError {
    ChangelogError::corrupted(format!("invalid changelog segment name {}", path.display()))
}
