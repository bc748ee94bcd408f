//! Storage backend trait definition.

use crate::error::BackendResult;

/// An append-only byte store holding the wikidb journal.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `flush` makes every appended byte durable
/// - `truncate` only ever shrinks the store
///
/// Implementations must be `Send + Sync`; the journal serialises writers
/// itself but may be read from any thread.
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BackendError::ReadPastEnd`] if the range is not
    /// fully inside the store, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> BackendResult<Vec<u8>>;

    /// Appends data and returns the offset it was written at.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. A failed append must leave
    /// the logical size unchanged.
    fn append(&mut self, data: &[u8]) -> BackendResult<u64>;

    /// Flushes pending writes to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> BackendResult<()>;

    /// Returns the current size in bytes (the next append offset).
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> BackendResult<u64>;

    /// Syncs data and metadata to disk. Stronger than [`flush`](Self::flush).
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> BackendResult<()>;

    /// Shrinks the store to `new_size` bytes.
    ///
    /// Used when a torn journal tail is discarded and when the journal is
    /// rewritten by a checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BackendError::TruncatePastEnd`] if `new_size` is
    /// larger than the current size.
    fn truncate(&mut self, new_size: u64) -> BackendResult<()>;
}
