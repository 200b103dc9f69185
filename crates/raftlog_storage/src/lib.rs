//! # raftlog storage
//!
//! Byte-store backends for the raftlog changelog.
//!
//! A changelog segment is, at this level, nothing but a growable run of
//! bytes: records are appended at the end, read back by offset during
//! recovery, and chopped off the tail when a torn write or a Raft rollback
//! has to be undone. Backends implement exactly that surface and nothing
//! more - all knowledge of the record format lives in `raftlog_core`.
//!
//! Every backend is owned by exactly one segment writer or reader at a
//! time, which is why the [`StorageBackend`] operations take `&mut self`
//! and the implementations carry no locks.
//!
//! ## Available backends
//!
//! - [`FileBackend`] - one segment file on disk
//! - [`InMemoryBackend`] - a `Vec<u8>` store for tests
//!
//! ## Example
//!
//! ```rust
//! use raftlog_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"record bytes").unwrap();
//!
//! let mut buf = [0u8; 12];
//! backend.read_exact_at(offset, &mut buf).unwrap();
//! assert_eq!(&buf, b"record bytes");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
