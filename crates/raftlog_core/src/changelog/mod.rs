//! Segmented changelog: record format, per-segment writer and reader,
//! filename descriptors, and the coordinator that ties them together.

mod descriptor;
mod reader;
mod record;
mod store;
mod writer;

pub use descriptor::{SegmentDescriptor, SEGMENT_EXTENSION};
pub use reader::{ReadResult, SegmentReader};
pub use record::{blob_checksum, ChangelogRecord, RecordHeader, RecordVersion, HEADER_SIZE};
pub use store::Changelog;
pub use writer::{SegmentWriter, WriteMode};
