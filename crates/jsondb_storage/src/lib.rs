//! # JsonDB Storage
//!
//! Byte-store backends for the JsonDB journal and checkpoint snapshot.
//!
//! A backend is an **opaque, append-oriented byte store**. It knows nothing
//! about documents, collections or log records; `jsondb_core` owns every
//! format that lands on a backend.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - shared in-process buffer for ephemeral databases
//!   and tests. Clones share the same bytes, so a test can "reopen" a store.
//! - [`FileBackend`] - a single OS file with atomic whole-content
//!   replacement through a temporary file.
//!
//! ## Example
//!
//! ```rust
//! use jsondb_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut journal = InMemoryBackend::new();
//! let offset = journal.append(b"record").unwrap();
//! assert_eq!(journal.read_at(offset, 6).unwrap(), b"record");
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
