//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{BackendError, BackendResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// An in-memory journal store.
///
/// Cloning an `InMemoryBackend` yields a second handle onto the **same**
/// buffer. Tests use this to close a store and open a new one over the
/// bytes the first one wrote.
///
/// # Example
///
/// ```rust
/// use wikidb_storage::{InMemoryBackend, StorageBackend};
///
/// let mut first = InMemoryBackend::new();
/// let second = first.clone();
/// first.append(b"shared").unwrap();
/// assert_eq!(second.size().unwrap(), 6);
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    data: Arc<RwLock<Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates a new empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend preloaded with `data`.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Returns a copy of the stored bytes.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> BackendResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let end = offset.saturating_add(len as u64);

        if end > size {
            return Err(BackendError::ReadPastEnd { offset, len, size });
        }

        let start = offset as usize;
        Ok(data[start..start + len].to_vec())
    }

    fn append(&mut self, bytes: &[u8]) -> BackendResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn flush(&mut self) -> BackendResult<()> {
        Ok(())
    }

    fn size(&self) -> BackendResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> BackendResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> BackendResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        if new_size > size {
            return Err(BackendError::TruncatePastEnd {
                requested: new_size,
                size,
            });
        }
        data.truncate(new_size as usize);
        Ok(())
    }
}
