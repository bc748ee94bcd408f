//! Transaction state.

use crate::document::Document;
use crate::error::{StorageError, StorageResult};
use crate::locks::Lock;
use crate::tables::Mutation;
use crate::types::{DocumentId, SequenceNumber, TransactionId};

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can stage mutations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted, or its commit failed.
    Aborted,
}

/// An open unit of work.
///
/// Staged mutations are invisible to readers until commit. Operations
/// called with an explicit transaction (`save_in`, `delete_in`, ...) add
/// to it; their plain counterparts open and commit one of their own.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    snapshot_seq: SequenceNumber,
    state: TransactionState,
    mutations: Vec<Mutation>,
}

impl Transaction {
    pub(crate) fn new(id: TransactionId, snapshot_seq: SequenceNumber) -> Self {
        Self {
            id,
            snapshot_seq,
            state: TransactionState::Active,
            mutations: Vec::new(),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Committed sequence at the time the transaction began.
    #[must_use]
    pub fn snapshot_seq(&self) -> SequenceNumber {
        self.snapshot_seq
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Stages a mutation.
    ///
    /// # Errors
    ///
    /// Returns an invalid operation error if the transaction has ended.
    pub fn push(&mut self, mutation: Mutation) -> StorageResult<()> {
        self.ensure_active()?;
        self.mutations.push(mutation);
        Ok(())
    }

    /// Staged mutations, in order.
    #[must_use]
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Number of staged mutations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Whether nothing has been staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// The most recent staged write for a document.
    ///
    /// `None` means the transaction has not touched the row; `Some(None)`
    /// means it deleted it.
    #[must_use]
    pub fn pending_document(&self, id: DocumentId) -> Option<Option<&Document>> {
        self.mutations.iter().rev().find_map(|m| match m {
            Mutation::PutDocument(doc) if doc.id() == id => Some(Some(doc.as_ref())),
            Mutation::DeleteDocument(deleted) if *deleted == id => Some(None),
            _ => None,
        })
    }

    /// The most recent staged write for a lock row, same shape as
    /// [`pending_document`](Self::pending_document).
    #[must_use]
    pub fn pending_lock(&self, id: DocumentId) -> Option<Option<&Lock>> {
        self.mutations.iter().rev().find_map(|m| match m {
            Mutation::PutLock(lock) if lock.document_id == id => Some(Some(lock)),
            Mutation::DeleteLock(deleted) if *deleted == id => Some(None),
            _ => None,
        })
    }

    pub(crate) fn mark_committed(&mut self) {
        self.state = TransactionState::Committed;
    }

    pub(crate) fn mark_aborted(&mut self) {
        self.state = TransactionState::Aborted;
    }

    pub(crate) fn ensure_active(&self) -> StorageResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(StorageError::invalid_operation(format!(
                "{} is no longer active ({:?})",
                self.id, self.state
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentReference;

    fn txn() -> Transaction {
        Transaction::new(TransactionId::new(1), SequenceNumber::new(0))
    }

    #[test]
    fn new_transaction_is_active_and_empty() {
        let txn = txn();
        assert!(txn.is_active());
        assert!(txn.is_empty());
    }

    #[test]
    fn push_after_commit_fails() {
        let mut txn = txn();
        txn.mark_committed();
        let err = txn.push(Mutation::CreateWiki("dev".into())).unwrap_err();
        assert!(matches!(err, StorageError::InvalidOperation { .. }));
    }

    #[test]
    fn pending_document_sees_latest_write() {
        let reference = DocumentReference::new("xwiki", "Main", "WebHome");
        let id = reference.id();
        let mut txn = txn();
        assert!(txn.pending_document(id).is_none());

        txn.push(Mutation::PutDocument(Box::new(
            Document::new(reference).with_content("draft"),
        )))
        .unwrap();
        assert_eq!(
            txn.pending_document(id).unwrap().map(|d| d.content.as_str()),
            Some("draft")
        );

        txn.push(Mutation::DeleteDocument(id)).unwrap();
        assert_eq!(txn.pending_document(id), Some(None));
    }
}
