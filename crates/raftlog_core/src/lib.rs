//! # raftlog
//!
//! A persistent, segmented, checksum-verified changelog for Raft consensus
//! entries.
//!
//! The changelog is the durable half of a Raft server's log: an append-only
//! sequence of opaque entries stored across rotating segment files, rebuilt
//! into memory at startup with torn tails repaired, rolled back when a new
//! leader overwrites an uncommitted suffix, and compacted from the front as
//! snapshots advance.
//!
//! ## Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use raftlog_core::{Changelog, LogEntry};
//!
//! # fn main() -> Result<(), raftlog_core::ChangelogError> {
//! let mut changelog = Changelog::new(std::path::Path::new("raft/log"), 100_000)?;
//! changelog.read_and_init(0)?;
//!
//! let index = changelog.next_entry_index();
//! changelog.append(index, LogEntry::new(1, 0, Bytes::from_static(b"op")), true)?;
//! # Ok(())
//! # }
//! ```
//!
//! On-disk layout and recovery rules live in [`changelog`]; the byte-level
//! backends live in the `raftlog_storage` crate.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod changelog;
pub mod config;
pub mod dir;
pub mod entry;
pub mod error;

pub use changelog::Changelog;
pub use config::Config;
pub use entry::{LogEntry, LogIndex};
pub use error::{ChangelogError, ChangelogResult};
