//! Fault injection for journal backends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wikidb_storage::{BackendError, BackendResult, StorageBackend};

#[derive(Debug, Default)]
struct Switches {
    fail_appends: AtomicBool,
    fail_syncs: AtomicBool,
}

/// Remote control for a [`FaultyBackend`] that has been moved into a store.
#[derive(Debug, Clone)]
pub struct FaultController {
    switches: Arc<Switches>,
}

impl FaultController {
    /// Makes every append fail until cleared.
    pub fn fail_appends(&self, fail: bool) {
        self.switches.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Makes every flush and sync fail until cleared.
    pub fn fail_syncs(&self, fail: bool) {
        self.switches.fail_syncs.store(fail, Ordering::SeqCst);
    }

    /// Clears all faults.
    pub fn heal(&self) {
        self.fail_appends(false);
        self.fail_syncs(false);
    }
}

/// A storage backend wrapper that fails on demand.
pub struct FaultyBackend {
    inner: Box<dyn StorageBackend>,
    switches: Arc<Switches>,
}

impl FaultyBackend {
    /// Wraps `inner`; no faults are active initially.
    pub fn new(inner: Box<dyn StorageBackend>) -> Self {
        Self {
            inner,
            switches: Arc::new(Switches::default()),
        }
    }

    /// A controller that keeps working after the backend is boxed away.
    #[must_use]
    pub fn controller(&self) -> FaultController {
        FaultController {
            switches: Arc::clone(&self.switches),
        }
    }

    fn injected(what: &str) -> BackendError {
        BackendError::Unavailable(format!("injected {what} failure"))
    }
}

impl StorageBackend for FaultyBackend {
    fn read_at(&self, offset: u64, len: usize) -> BackendResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> BackendResult<u64> {
        if self.switches.fail_appends.load(Ordering::SeqCst) {
            return Err(Self::injected("append"));
        }
        self.inner.append(data)
    }

    fn flush(&mut self) -> BackendResult<()> {
        if self.switches.fail_syncs.load(Ordering::SeqCst) {
            return Err(Self::injected("flush"));
        }
        self.inner.flush()
    }

    fn size(&self) -> BackendResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> BackendResult<()> {
        if self.switches.fail_syncs.load(Ordering::SeqCst) {
            return Err(Self::injected("sync"));
        }
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> BackendResult<()> {
        self.inner.truncate(new_size)
    }
}
