//! Transaction manager.

use crate::error::{StorageError, StorageResult};
use crate::journal::{Journal, JournalRecord, JournalRecordRef};
use crate::tables::Tables;
use crate::transaction::state::Transaction;
use crate::types::{SequenceNumber, TransactionId};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Owns the committed tables and serializes commits.
///
/// The transaction manager provides:
/// - Single-writer commits, bounded by a lock timeout
/// - Snapshot reads through `Arc<Tables>`
/// - Journal-based durability, one frame per commit
///
/// Readers never block on a commit: they clone the current `Arc` and keep
/// reading it while the next state is being built.
pub struct TransactionManager {
    journal: Journal,
    tables: RwLock<Arc<Tables>>,
    write_lock: Mutex<()>,
    write_timeout: Duration,
    next_txid: AtomicU64,
    committed_seq: AtomicU64,
}

impl TransactionManager {
    /// Creates a manager over an empty journal.
    pub fn new(journal: Journal, write_timeout: Duration) -> Self {
        Self::with_state(journal, Tables::default(), SequenceNumber::new(0), write_timeout)
    }

    fn with_state(
        journal: Journal,
        tables: Tables,
        committed_seq: SequenceNumber,
        write_timeout: Duration,
    ) -> Self {
        Self {
            journal,
            tables: RwLock::new(Arc::new(tables)),
            write_lock: Mutex::new(()),
            write_timeout,
            next_txid: AtomicU64::new(1),
            committed_seq: AtomicU64::new(committed_seq.as_u64()),
        }
    }

    /// A manager over a fresh in-memory journal with `wiki` created.
    #[cfg(test)]
    pub(crate) fn in_memory_with_wiki(wiki: &str) -> Self {
        let journal = Journal::new(Box::new(wikidb_storage::InMemoryBackend::new()), false);
        let tm = Self::new(journal, Duration::from_millis(100));
        tm.transaction(|txn| txn.push(crate::tables::Mutation::CreateWiki(wiki.into())))
            .expect("bootstrap wiki");
        tm
    }

    /// Rebuilds the tables by replaying `journal`.
    ///
    /// # Errors
    ///
    /// Returns journal corruption if an intact record no longer applies
    /// cleanly, or the backend error if the journal cannot be read.
    pub fn recover(journal: Journal, write_timeout: Duration) -> StorageResult<Self> {
        let records = journal.replay()?;
        let mut tables = Tables::default();
        let mut sequence = SequenceNumber::new(0);
        let mut commits = 0usize;

        for record in records {
            match record {
                JournalRecord::Snapshot {
                    sequence: seq,
                    tables: snapshot,
                } => {
                    tables = snapshot;
                    sequence = seq;
                    commits = 0;
                }
                JournalRecord::Commit {
                    sequence: seq,
                    mutations,
                    ..
                } => {
                    for mutation in &mutations {
                        tables.apply(mutation).map_err(|err| {
                            StorageError::journal_corruption(format!(
                                "commit {} does not replay: {err}",
                                seq.as_u64()
                            ))
                        })?;
                    }
                    sequence = seq;
                    commits += 1;
                }
            }
        }

        if sequence.as_u64() > 0 {
            info!(
                sequence = sequence.as_u64(),
                commits,
                documents = tables.document_count(),
                "recovered from journal"
            );
        }
        Ok(Self::with_state(journal, tables, sequence, write_timeout))
    }

    /// Begins a new transaction.
    pub fn begin(&self) -> Transaction {
        let txid = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        Transaction::new(txid, self.committed_seq())
    }

    /// Commits a transaction.
    ///
    /// Mutations are applied to a copy of the current tables; the copy is
    /// published only after its journal frame has been written. An empty
    /// transaction commits without touching the journal.
    ///
    /// # Errors
    ///
    /// Returns contention if the write lock is not acquired within the
    /// configured timeout, the constraint error of the first mutation that
    /// does not apply, or the journal error. On any error the transaction
    /// is aborted and the committed state is unchanged.
    pub fn commit(&self, txn: &mut Transaction) -> StorageResult<SequenceNumber> {
        txn.ensure_active()?;

        if txn.is_empty() {
            txn.mark_committed();
            return Ok(self.committed_seq());
        }

        let result = self.commit_inner(txn);
        match &result {
            Ok(_) => txn.mark_committed(),
            Err(_) => txn.mark_aborted(),
        }
        result
    }

    fn commit_inner(&self, txn: &Transaction) -> StorageResult<SequenceNumber> {
        let Some(_guard) = self.write_lock.try_lock_for(self.write_timeout) else {
            return Err(StorageError::contention(format!(
                "write lock not acquired within {:?}",
                self.write_timeout
            )));
        };

        let mut next = Tables::clone(&self.snapshot());
        for mutation in txn.mutations() {
            next.apply(mutation)?;
        }

        let sequence = self.committed_seq().next();
        self.journal.append(&JournalRecordRef::Commit {
            txid: txn.id(),
            sequence,
            mutations: txn.mutations(),
        })?;

        *self.tables.write() = Arc::new(next);
        self.committed_seq.store(sequence.as_u64(), Ordering::SeqCst);

        debug!(
            txid = txn.id().as_u64(),
            sequence = sequence.as_u64(),
            mutations = txn.len(),
            "committed"
        );
        Ok(sequence)
    }

    /// Aborts a transaction, discarding its mutations.
    ///
    /// # Errors
    ///
    /// Returns an invalid operation error if the transaction has ended.
    pub fn abort(&self, txn: &mut Transaction) -> StorageResult<()> {
        txn.ensure_active()?;
        txn.mark_aborted();
        debug!(txid = txn.id().as_u64(), "aborted");
        Ok(())
    }

    /// Runs `f` in a fresh transaction.
    ///
    /// Commits if `f` returns `Ok`, aborts otherwise.
    ///
    /// # Errors
    ///
    /// Returns the error from `f` or from the commit.
    pub fn transaction<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Transaction) -> StorageResult<T>,
    {
        let mut txn = self.begin();
        match f(&mut txn) {
            Ok(value) => {
                self.commit(&mut txn)?;
                Ok(value)
            }
            Err(err) => {
                if txn.is_active() {
                    txn.mark_aborted();
                }
                Err(err)
            }
        }
    }

    /// The current committed tables.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Tables> {
        Arc::clone(&self.tables.read())
    }

    /// Returns the current committed sequence number.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        SequenceNumber::new(self.committed_seq.load(Ordering::SeqCst))
    }

    /// Journal size in bytes.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the size is unavailable.
    pub fn journal_size(&self) -> StorageResult<u64> {
        self.journal.size()
    }

    /// Compacts the journal down to one snapshot of the committed state.
    ///
    /// `write` receives the journal and the snapshot record and decides
    /// how to replace the contents; commits are held off meanwhile.
    ///
    /// # Errors
    ///
    /// Returns contention if the write lock is busy past the timeout, or
    /// the error returned by `write`.
    pub fn checkpoint<F>(&self, write: F) -> StorageResult<SequenceNumber>
    where
        F: FnOnce(&Journal, &JournalRecordRef<'_>) -> StorageResult<()>,
    {
        let Some(_guard) = self.write_lock.try_lock_for(self.write_timeout) else {
            return Err(StorageError::contention("checkpoint could not take the write lock"));
        };

        let tables = self.snapshot();
        let sequence = self.committed_seq();
        write(
            &self.journal,
            &JournalRecordRef::Snapshot {
                sequence,
                tables: &tables,
            },
        )?;

        info!(
            sequence = sequence.as_u64(),
            documents = tables.document_count(),
            "checkpoint complete"
        );
        Ok(sequence)
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("committed_seq", &self.committed_seq())
            .field("write_timeout", &self.write_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, DocumentReference};
    use crate::tables::Mutation;
    use wikidb_storage::InMemoryBackend;

    fn create_manager(backend: &InMemoryBackend) -> TransactionManager {
        let journal = Journal::new(Box::new(backend.clone()), false);
        TransactionManager::recover(journal, Duration::from_millis(100)).unwrap()
    }

    fn put(name: &str) -> Mutation {
        Mutation::PutDocument(Box::new(Document::new(DocumentReference::new(
            "xwiki", "Main", name,
        ))))
    }

    fn bootstrap(tm: &TransactionManager) {
        tm.transaction(|txn| txn.push(Mutation::CreateWiki("xwiki".into())))
            .unwrap();
    }

    #[test]
    fn commit_empty_transaction() {
        let tm = create_manager(&InMemoryBackend::new());
        let mut txn = tm.begin();
        let seq = tm.commit(&mut txn).unwrap();
        assert_eq!(seq.as_u64(), 0);
        assert!(!txn.is_active());
        assert_eq!(tm.journal_size().unwrap(), 0);
    }

    #[test]
    fn commit_publishes_and_advances_sequence() {
        let tm = create_manager(&InMemoryBackend::new());
        bootstrap(&tm);

        let before = tm.snapshot();
        let mut txn = tm.begin();
        txn.push(put("A")).unwrap();
        assert_eq!(tm.snapshot().document_count(), 0);

        let seq = tm.commit(&mut txn).unwrap();
        assert_eq!(seq.as_u64(), 2);
        assert_eq!(tm.snapshot().document_count(), 1);
        // Old snapshots stay as they were.
        assert_eq!(before.document_count(), 0);
    }

    #[test]
    fn failed_commit_leaves_state_unchanged() {
        let tm = create_manager(&InMemoryBackend::new());
        bootstrap(&tm);

        let mut txn = tm.begin();
        txn.push(put("A")).unwrap();
        txn.push(Mutation::CreateWiki("xwiki".into())).unwrap();

        assert!(tm.commit(&mut txn).is_err());
        assert_eq!(txn.state(), crate::TransactionState::Aborted);
        assert_eq!(tm.snapshot().document_count(), 0);
        assert_eq!(tm.committed_seq().as_u64(), 1);
    }

    #[test]
    fn closure_error_aborts() {
        let tm = create_manager(&InMemoryBackend::new());
        bootstrap(&tm);

        let result: StorageResult<()> = tm.transaction(|txn| {
            txn.push(put("A"))?;
            Err(StorageError::invalid_operation("changed my mind"))
        });
        assert!(result.is_err());
        assert_eq!(tm.snapshot().document_count(), 0);
    }

    #[test]
    fn commit_after_abort_fails() {
        let tm = create_manager(&InMemoryBackend::new());
        let mut txn = tm.begin();
        tm.abort(&mut txn).unwrap();
        assert!(tm.commit(&mut txn).is_err());
    }

    #[test]
    fn busy_writer_reports_contention() {
        let tm = create_manager(&InMemoryBackend::new());
        bootstrap(&tm);

        let _held = tm.write_lock.lock();
        let mut txn = tm.begin();
        txn.push(put("A")).unwrap();
        let err = tm.commit(&mut txn).unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, StorageError::Contention { .. }));
    }

    #[test]
    fn recovery_replays_commits() {
        let backend = InMemoryBackend::new();
        {
            let tm = create_manager(&backend);
            bootstrap(&tm);
            tm.transaction(|txn| {
                txn.push(put("A"))?;
                txn.push(put("B"))
            })
            .unwrap();
        }

        let tm = create_manager(&backend);
        assert_eq!(tm.snapshot().document_count(), 2);
        assert_eq!(tm.committed_seq().as_u64(), 2);
    }

    #[test]
    fn checkpoint_then_recover() {
        let backend = InMemoryBackend::new();
        {
            let tm = create_manager(&backend);
            bootstrap(&tm);
            tm.transaction(|txn| txn.push(put("A"))).unwrap();
            tm.checkpoint(|journal, record| journal.rewrite(record))
                .unwrap();
            tm.transaction(|txn| txn.push(put("B"))).unwrap();
        }

        let tm = create_manager(&backend);
        assert_eq!(tm.snapshot().document_count(), 2);
        assert_eq!(tm.committed_seq().as_u64(), 3);
    }
}
