//! Committed table state and the mutations that change it.

use crate::document::{Document, DocumentReference};
use crate::error::{StorageError, StorageResult};
use crate::links::Link;
use crate::locks::Lock;
use crate::types::DocumentId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One change staged in a transaction and recorded in the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    /// Insert or overwrite a document by identity.
    PutDocument(Box<Document>),
    /// Remove a document row.
    DeleteDocument(DocumentId),
    /// Acquire or refresh a lock.
    PutLock(Lock),
    /// Release a lock.
    DeleteLock(DocumentId),
    /// Replace the forward link set of a document.
    ReplaceLinks {
        /// Source document.
        source: DocumentId,
        /// New forward links, in content order.
        links: Vec<Link>,
    },
    /// Drop the forward link set of a document.
    DeleteLinks(DocumentId),
    /// Add a wiki to the catalogue.
    CreateWiki(String),
}

/// The full committed state of a store.
///
/// Readers hold an `Arc<Tables>` snapshot; commits build a new value and
/// swap it in, so a reader never sees half a transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    wikis: BTreeSet<String>,
    documents: BTreeMap<DocumentId, Document>,
    locks: BTreeMap<DocumentId, Lock>,
    links: BTreeMap<DocumentId, Vec<Link>>,
}

impl Tables {
    /// Applies one mutation, enforcing table constraints.
    ///
    /// # Errors
    ///
    /// Returns a constraint violation if the document's wiki is unknown,
    /// its id collides with a different identity, or a wiki is created
    /// twice.
    pub fn apply(&mut self, mutation: &Mutation) -> StorageResult<()> {
        match mutation {
            Mutation::PutDocument(doc) => {
                let reference = &doc.reference;
                if !self.wikis.contains(reference.wiki()) {
                    return Err(StorageError::constraint(
                        reference.to_string(),
                        format!("wiki `{}` does not exist", reference.wiki()),
                    ));
                }
                let id = reference.id();
                if let Some(existing) = self.documents.get(&id) {
                    if existing.reference != *reference {
                        return Err(StorageError::constraint(
                            reference.to_string(),
                            format!("{id} is already used by {}", existing.reference),
                        ));
                    }
                }
                self.documents.insert(id, (**doc).clone());
            }
            Mutation::DeleteDocument(id) => {
                self.documents.remove(id);
            }
            Mutation::PutLock(lock) => {
                self.locks.insert(lock.document_id, lock.clone());
            }
            Mutation::DeleteLock(id) => {
                self.locks.remove(id);
            }
            Mutation::ReplaceLinks { source, links } => {
                if links.is_empty() {
                    self.links.remove(source);
                } else {
                    self.links.insert(*source, links.clone());
                }
            }
            Mutation::DeleteLinks(id) => {
                self.links.remove(id);
            }
            Mutation::CreateWiki(name) => {
                if !self.wikis.insert(name.clone()) {
                    return Err(StorageError::constraint(
                        name.clone(),
                        "wiki already exists",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Whether a wiki is in the catalogue.
    #[must_use]
    pub fn has_wiki(&self, name: &str) -> bool {
        self.wikis.contains(name)
    }

    /// Wiki names, sorted.
    pub fn wikis(&self) -> impl Iterator<Item = &str> {
        self.wikis.iter().map(String::as_str)
    }

    /// Looks up a document row by id.
    #[must_use]
    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(&id)
    }

    /// Looks up a document by identity, guarding against id collisions.
    #[must_use]
    pub fn document_by_reference(&self, reference: &DocumentReference) -> Option<&Document> {
        self.documents
            .get(&reference.id())
            .filter(|doc| doc.reference == *reference)
    }

    /// All documents in storage-natural (id) order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    /// Documents of one wiki in storage-natural order.
    pub fn documents_in<'a>(&'a self, wiki: &'a str) -> impl Iterator<Item = &'a Document> {
        self.documents
            .values()
            .filter(move |doc| doc.reference.wiki() == wiki)
    }

    /// Number of document rows.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Lock row for a document.
    #[must_use]
    pub fn lock(&self, id: DocumentId) -> Option<&Lock> {
        self.locks.get(&id)
    }

    /// Number of lock rows.
    #[must_use]
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    /// Forward links of a document.
    #[must_use]
    pub fn links(&self, id: DocumentId) -> &[Link] {
        self.links.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Every forward link row.
    pub fn all_links(&self) -> impl Iterator<Item = &Link> {
        self.links.values().flatten()
    }
}
