//! The backend trait.

use crate::error::StorageResult;
use std::fmt::Debug;

/// An opaque byte store used for the journal and the checkpoint snapshot.
///
/// # Invariants
///
/// - `append` returns the offset the data was written at
/// - `read_at` returns exactly the bytes previously written at that offset
/// - after `sync` returns, every appended byte survives process termination
/// - `replace_contents` is all-or-nothing: a reader sees either the old or
///   the new contents, never a mix
pub trait StorageBackend: Send + Sync + Debug {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] when the range is not
    /// fully stored, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Reads every stored byte.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the store cannot be read.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        self.read_at(0, size as usize)
    }

    /// Appends data and returns the offset it starts at.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the write fails.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Flushes and forces data and metadata to stable storage.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the number of stored bytes.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Drops every byte after `new_size`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::InvalidTruncate`] if `new_size` exceeds
    /// the current size.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Atomically replaces the whole contents with `data`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the replacement cannot be made durable. The
    /// previous contents are left intact in that case.
    fn replace_contents(&mut self, data: &[u8]) -> StorageResult<()>;
}
