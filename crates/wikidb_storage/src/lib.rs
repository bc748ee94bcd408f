//! # wikidb storage
//!
//! Append-only byte stores underneath the wikidb journal.
//!
//! Backends are **opaque**: they know nothing about journal frames,
//! documents or links. The core crate owns every format decision and
//! only needs the handful of operations in [`StorageBackend`].
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - Ephemeral stores and tests. Clones share the
//!   same buffer, so a store can be "reopened" over the same bytes.
//! - [`FileBackend`] - A single journal file on disk.
//!
//! ## Example
//!
//! ```rust
//! use wikidb_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"frame").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"frame");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{BackendError, BackendResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
