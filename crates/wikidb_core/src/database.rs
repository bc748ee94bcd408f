//! Store facade and recovery.

use crate::config::Config;
use crate::context::Context;
use crate::dir::StoreDir;
use crate::documents::DocumentStore;
use crate::error::{StorageError, StorageResult};
use crate::journal::Journal;
use crate::links::LinkIndex;
use crate::locks::LockManager;
use crate::mapping::ClassMappingRegistry;
use crate::query::QueryExecutor;
use crate::tables::Mutation;
use crate::transaction::{Transaction, TransactionManager};
use crate::types::SequenceNumber;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use wikidb_storage::{FileBackend, InMemoryBackend, StorageBackend};

/// The main store handle.
///
/// `WikiStore` wires the components together over one transaction
/// manager:
/// - [`DocumentStore`] for document CRUD
/// - [`QueryExecutor`] for searches
/// - [`LockManager`] for advisory edit locks
/// - [`LinkIndex`] for links and backlinks
/// - [`ClassMappingRegistry`] for class projections
///
/// The handle is `Send + Sync`; share it behind an `Arc`.
///
/// # Example
///
/// ```rust,ignore
/// use wikidb_core::{Document, DocumentReference, WikiStore};
///
/// let store = WikiStore::open(Path::new("my_wiki"))?;
/// let ctx = store.context();
///
/// let mut doc = Document::new(DocumentReference::new("xwiki", "Main", "WebHome"))
///     .with_content("Welcome, see [[Sandbox.WebHome]]");
/// store.documents().save(&mut doc, &ctx)?;
/// ```
pub struct WikiStore {
    config: Arc<Config>,
    dir: Option<StoreDir>,
    txn: Arc<TransactionManager>,
    registry: Arc<ClassMappingRegistry>,
    documents: DocumentStore,
    locks: LockManager,
    links: LinkIndex,
    queries: QueryExecutor,
}

/// Summary counters of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Wiki names, sorted.
    pub wikis: Vec<String>,
    /// Document rows, translations included.
    pub documents: usize,
    /// Lock rows.
    pub locks: usize,
    /// Forward link rows.
    pub links: usize,
    /// Registered class mappings, sorted; wiki-scoped ones as `wiki:Class`.
    pub mappings: Vec<String>,
    /// Last committed sequence.
    pub committed_seq: u64,
    /// Journal size in bytes.
    pub journal_bytes: u64,
}

impl WikiStore {
    /// Opens a store directory with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another process has the store open (`StoreLocked`)
    /// - The journal cannot be read or does not replay
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a store directory.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open); also fails if the directory is missing and
    /// `create_if_missing` is false.
    pub fn open_with_config(path: &Path, config: Config) -> StorageResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;
        let backend = FileBackend::open(&dir.journal_path())?;
        Self::open_parts(config, Some(dir), Box::new(backend))
    }

    /// Opens a store over an arbitrary journal backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be read or does not replay.
    pub fn open_with_backend(config: Config, backend: Box<dyn StorageBackend>) -> StorageResult<Self> {
        Self::open_parts(config, None, backend)
    }

    /// Opens an empty store held in memory.
    ///
    /// # Errors
    ///
    /// Only fails if bootstrapping the main wiki fails.
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::open_with_backend(Config::default(), Box::new(InMemoryBackend::new()))
    }

    fn open_parts(
        config: Config,
        dir: Option<StoreDir>,
        backend: Box<dyn StorageBackend>,
    ) -> StorageResult<Self> {
        let config = Arc::new(config);
        let journal = Journal::new(backend, config.sync_on_commit);
        let txn = Arc::new(TransactionManager::recover(journal, config.write_timeout)?);

        if !txn.snapshot().has_wiki(&config.main_wiki) {
            txn.transaction(|t| t.push(Mutation::CreateWiki(config.main_wiki.clone())))?;
        }

        let registry = Arc::new(ClassMappingRegistry::new(Arc::clone(&txn)));
        let store = Self {
            documents: DocumentStore::new(Arc::clone(&txn), Arc::clone(&registry), Arc::clone(&config)),
            locks: LockManager::new(Arc::clone(&txn)),
            links: LinkIndex::new(Arc::clone(&txn)),
            queries: QueryExecutor::new(Arc::clone(&txn), Arc::clone(&registry)),
            config,
            dir,
            txn,
            registry,
        };
        store.registry.register_all(&store.context());

        let tables = store.txn.snapshot();
        info!(
            path = ?store.dir.as_ref().map(StoreDir::path),
            documents = tables.document_count(),
            sequence = store.txn.committed_seq().as_u64(),
            "store opened"
        );
        Ok(store)
    }

    /// Document operations.
    #[must_use]
    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    /// Lock operations.
    #[must_use]
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Link operations.
    #[must_use]
    pub fn links(&self) -> &LinkIndex {
        &self.links
    }

    /// Query operations.
    #[must_use]
    pub fn queries(&self) -> &QueryExecutor {
        &self.queries
    }

    /// Class mapping registry.
    #[must_use]
    pub fn mappings(&self) -> &ClassMappingRegistry {
        &self.registry
    }

    /// The configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A guest context on the main wiki.
    #[must_use]
    pub fn context(&self) -> Context {
        Context::new(self.config.main_wiki.clone())
    }

    /// Begins a caller-managed transaction for the `_in` operations.
    pub fn begin(&self) -> Transaction {
        self.txn.begin()
    }

    /// Commits a caller-managed transaction.
    ///
    /// # Errors
    ///
    /// Returns contention, a constraint violation or a backend error; the
    /// transaction is aborted and nothing is applied.
    pub fn commit(&self, txn: &mut Transaction) -> StorageResult<SequenceNumber> {
        self.txn.commit(txn)
    }

    /// Discards a caller-managed transaction.
    ///
    /// # Errors
    ///
    /// Returns an invalid operation error if the transaction has ended.
    pub fn abort(&self, txn: &mut Transaction) -> StorageResult<()> {
        self.txn.abort(txn)
    }

    /// Runs `f` in a transaction, committing on `Ok` and aborting on `Err`.
    ///
    /// # Errors
    ///
    /// Returns the error from `f` or from the commit.
    pub fn transaction<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Transaction) -> StorageResult<T>,
    {
        self.txn.transaction(f)
    }

    /// Adds a wiki to the catalogue.
    ///
    /// # Errors
    ///
    /// Returns a constraint violation if the name is empty, contains `:`
    /// or is already taken.
    pub fn create_wiki(&self, name: &str) -> StorageResult<()> {
        if name.trim().is_empty() || name.contains(':') {
            return Err(StorageError::constraint(name, "invalid wiki name"));
        }
        self.txn
            .transaction(|txn| txn.push(Mutation::CreateWiki(name.to_string())))?;
        info!(wiki = name, "wiki created");
        Ok(())
    }

    /// Wiki names, sorted.
    #[must_use]
    pub fn wikis(&self) -> Vec<String> {
        self.txn.snapshot().wikis().map(str::to_string).collect()
    }

    /// Compacts the journal to a single snapshot of the committed state.
    ///
    /// On disk the snapshot is written beside the journal and renamed over
    /// it, so a crash leaves either the old or the new journal.
    ///
    /// # Errors
    ///
    /// Returns contention if a commit holds the writer lock past the
    /// timeout, or the I/O error; the old journal stays in use on error.
    pub fn checkpoint(&self) -> StorageResult<SequenceNumber> {
        match &self.dir {
            Some(dir) => self.txn.checkpoint(|journal, record| {
                let temp = dir.journal_temp_path();
                if temp.exists() {
                    fs::remove_file(&temp)?;
                }
                let fresh = FileBackend::open(&temp)?;
                journal.replace_with(Box::new(fresh), record, || {
                    fs::rename(&temp, dir.journal_path())?;
                    Ok(())
                })
            }),
            None => self
                .txn
                .checkpoint(|journal, record| journal.rewrite(record)),
        }
    }

    /// Summary counters.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the journal size is unavailable.
    pub fn stats(&self) -> StorageResult<StoreStats> {
        let tables = self.txn.snapshot();
        Ok(StoreStats {
            wikis: tables.wikis().map(str::to_string).collect(),
            documents: tables.document_count(),
            locks: tables.lock_count(),
            links: tables.all_links().count(),
            mappings: self.registry.registered_classes(),
            committed_seq: self.txn.committed_seq().as_u64(),
            journal_bytes: self.txn.journal_size()?,
        })
    }
}

impl std::fmt::Debug for WikiStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WikiStore")
            .field("main_wiki", &self.config.main_wiki)
            .field("path", &self.dir.as_ref().map(StoreDir::path))
            .field("txn", &self.txn)
            .finish_non_exhaustive()
    }
}
