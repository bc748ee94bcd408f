//! Advisory document locks.
//!
//! A lock records who is editing a document and since when. Nothing in the
//! store enforces it: saves succeed whether or not a lock is held, and
//! release does not check the owner. Expiry is left to callers through
//! [`Lock::is_expired`].

use crate::document::DocumentReference;
use crate::error::StorageResult;
use crate::tables::Mutation;
use crate::transaction::{Transaction, TransactionManager};
use crate::types::DocumentId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One lock row. At most one exists per document id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    /// Locked document.
    pub document_id: DocumentId,
    /// User holding the lock.
    pub owner: String,
    /// When the lock was taken.
    pub acquired_at: DateTime<Utc>,
}

impl Lock {
    /// A lock taken now.
    pub fn new(document_id: DocumentId, owner: impl Into<String>) -> Self {
        Self {
            document_id,
            owner: owner.into(),
            acquired_at: Utc::now(),
        }
    }

    /// A lock on `reference` taken now.
    pub fn for_document(reference: &DocumentReference, owner: impl Into<String>) -> Self {
        Self::new(reference.id(), owner)
    }

    /// Whether the lock is older than `timeout` at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now.signed_duration_since(self.acquired_at) > timeout
    }
}

/// Reads and writes lock rows.
#[derive(Debug, Clone)]
pub struct LockManager {
    txn: Arc<TransactionManager>,
}

impl LockManager {
    pub(crate) fn new(txn: Arc<TransactionManager>) -> Self {
        Self { txn }
    }

    /// The committed lock on a document, if any.
    #[must_use]
    pub fn load(&self, document_id: DocumentId) -> Option<Lock> {
        self.txn.snapshot().lock(document_id).cloned()
    }

    /// Takes or refreshes a lock in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns contention or a backend error if the commit fails.
    pub fn save(&self, lock: &Lock) -> StorageResult<()> {
        self.txn.transaction(|txn| self.save_in(txn, lock))
    }

    /// Stages a lock upsert in `txn`.
    ///
    /// # Errors
    ///
    /// Returns an invalid operation error if `txn` has ended.
    pub fn save_in(&self, txn: &mut Transaction, lock: &Lock) -> StorageResult<()> {
        txn.push(Mutation::PutLock(lock.clone()))
    }

    /// Releases the lock on a document in its own transaction.
    ///
    /// Releasing an absent lock succeeds.
    ///
    /// # Errors
    ///
    /// Returns contention or a backend error if the commit fails.
    pub fn delete(&self, document_id: DocumentId) -> StorageResult<()> {
        self.txn.transaction(|txn| self.delete_in(txn, document_id))
    }

    /// Stages a lock release in `txn`.
    ///
    /// # Errors
    ///
    /// Returns an invalid operation error if `txn` has ended.
    pub fn delete_in(&self, txn: &mut Transaction, document_id: DocumentId) -> StorageResult<()> {
        txn.push(Mutation::DeleteLock(document_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_manager() -> LockManager {
        LockManager::new(Arc::new(TransactionManager::in_memory_with_wiki("xwiki")))
    }

    fn reference() -> DocumentReference {
        DocumentReference::new("xwiki", "Main", "WebHome")
    }

    #[test]
    fn save_load_delete() {
        let locks = create_manager();
        let lock = Lock::for_document(&reference(), "XWiki.Admin");

        assert!(locks.load(lock.document_id).is_none());
        locks.save(&lock).unwrap();
        assert_eq!(locks.load(lock.document_id), Some(lock.clone()));

        locks.delete(lock.document_id).unwrap();
        assert!(locks.load(lock.document_id).is_none());
    }

    #[test]
    fn save_replaces_previous_owner() {
        let locks = create_manager();
        let id = reference().id();
        locks.save(&Lock::new(id, "XWiki.Alice")).unwrap();
        locks.save(&Lock::new(id, "XWiki.Bob")).unwrap();
        assert_eq!(locks.load(id).unwrap().owner, "XWiki.Bob");
    }

    #[test]
    fn release_of_missing_lock_is_ok() {
        let locks = create_manager();
        assert!(locks.delete(reference().id()).is_ok());
    }

    #[test]
    fn staged_lock_is_invisible_until_commit() {
        let tm = Arc::new(TransactionManager::in_memory_with_wiki("xwiki"));
        let locks = LockManager::new(Arc::clone(&tm));
        let lock = Lock::for_document(&reference(), "XWiki.Admin");

        let mut txn = tm.begin();
        locks.save_in(&mut txn, &lock).unwrap();
        assert!(locks.load(lock.document_id).is_none());
        assert_eq!(txn.pending_lock(lock.document_id), Some(Some(&lock)));

        tm.commit(&mut txn).unwrap();
        assert!(locks.load(lock.document_id).is_some());
    }

    #[test]
    fn expiry_is_relative_to_acquisition() {
        let lock = Lock::new(DocumentId::new(1), "XWiki.Admin");
        let timeout = Duration::minutes(30);
        assert!(!lock.is_expired(lock.acquired_at, timeout));
        assert!(lock.is_expired(lock.acquired_at + Duration::minutes(31), timeout));
    }
}
