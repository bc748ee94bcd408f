//! Document persistence.

use crate::config::Config;
use crate::context::Context;
use crate::document::{Document, DocumentReference};
use crate::error::{StorageError, StorageResult};
use crate::links::LinkIndex;
use crate::mapping::ClassMappingRegistry;
use crate::tables::Mutation;
use crate::transaction::{Transaction, TransactionManager};
use chrono::Utc;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{trace, warn};

/// Saves, loads and deletes documents.
///
/// Every mutating operation comes in two forms: `op` runs in a transaction
/// of its own and commits it, `op_in` stages its mutations in a
/// caller-owned [`Transaction`] and leaves committing to the caller.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    txn: Arc<TransactionManager>,
    registry: Arc<ClassMappingRegistry>,
    links: LinkIndex,
    config: Arc<Config>,
}

impl DocumentStore {
    pub(crate) fn new(
        txn: Arc<TransactionManager>,
        registry: Arc<ClassMappingRegistry>,
        config: Arc<Config>,
    ) -> Self {
        let links = LinkIndex::new(Arc::clone(&txn));
        Self {
            txn,
            registry,
            links,
            config,
        }
    }

    /// Saves a document in its own transaction.
    ///
    /// On success `doc` carries the stored revision, author and update
    /// date. If `doc` hosts a class with a mapping, the mapping is
    /// registered; if the class lost its mapping, it is unregistered.
    ///
    /// # Errors
    ///
    /// See [`save_in`](Self::save_in); commit failures add contention and
    /// backend errors. `doc` is unchanged on error.
    pub fn save(&self, doc: &mut Document, ctx: &Context) -> StorageResult<()> {
        let previous_class = self
            .txn
            .snapshot()
            .document_by_reference(&doc.reference)
            .and_then(|d| d.class.as_ref().map(|c| c.name.clone()));

        let mut staged = doc.clone();
        self.txn
            .transaction(|txn| self.save_in(txn, &mut staged, ctx))?;
        *doc = staged;

        if doc.class.as_ref().is_some_and(|c| c.has_custom_mapping()) {
            if let Err(err) = self.registry.register_from_document(doc) {
                warn!(document = %doc.reference, error = %err, "saved class mapping did not register");
            }
        }
        let current_class = doc
            .class
            .as_ref()
            .filter(|c| c.has_custom_mapping())
            .map(|c| c.name.as_str());
        if let Some(previous) = previous_class {
            if current_class != Some(previous.as_str()) {
                self.registry
                    .unregister_from_document(&doc.reference, &previous);
            }
        }
        Ok(())
    }

    /// Stages a save of `doc` in `txn`.
    ///
    /// Assigns the next revision, fills an empty author from `ctx` and
    /// stamps the update date. With `update_links_on_save` the document's
    /// forward links are replaced in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns a constraint violation for an invalid identity, a wiki
    /// missing from the catalogue, a hosted class named after another
    /// document, or two objects sharing a class and number; a mapping
    /// mismatch for an invalid hosted mapping or object values that do not
    /// fit a registered mapping. `doc` is unchanged on error.
    pub fn save_in(&self, txn: &mut Transaction, doc: &mut Document, ctx: &Context) -> StorageResult<()> {
        txn.ensure_active()?;
        let reference = &doc.reference;
        reference.validate()?;

        let tables = self.txn.snapshot();
        let wiki_pending = txn
            .mutations()
            .iter()
            .any(|m| matches!(m, Mutation::CreateWiki(name) if name == reference.wiki()));
        if !tables.has_wiki(reference.wiki()) && !wiki_pending {
            return Err(StorageError::constraint(
                reference.to_string(),
                format!("wiki `{}` does not exist", reference.wiki()),
            ));
        }

        let mut numbers = HashSet::new();
        for object in &doc.objects {
            if !numbers.insert((object.class_name.as_str(), object.number)) {
                return Err(StorageError::constraint(
                    reference.to_string(),
                    format!(
                        "object {} of class {} appears twice",
                        object.number, object.class_name
                    ),
                ));
            }
            self.registry.check_object(reference.wiki(), object)?;
        }

        if let Some(class) = &doc.class {
            if !class.name.is_empty() && class.name != reference.full_name() {
                return Err(StorageError::constraint(
                    reference.to_string(),
                    format!("hosted class is named `{}`", class.name),
                ));
            }
            if let Some(descriptor) = class.custom_mapping.as_deref() {
                if class.has_custom_mapping() {
                    self.registry.validate_mapping(class, descriptor)?;
                }
            }
        }

        let base_revision = match txn.pending_document(doc.id()) {
            Some(pending) => pending.map_or(0, |d| d.revision),
            None => tables.document_by_reference(reference).map_or(0, |d| d.revision),
        };

        let mut staged = doc.clone();
        staged.revision = base_revision + 1;
        staged.update_date = Utc::now();
        if staged.author.is_empty() {
            staged.author = ctx.user().to_string();
        }
        if let Some(class) = staged.class.as_mut().filter(|c| c.name.is_empty()) {
            class.name = staged.reference.full_name();
        }

        txn.push(Mutation::PutDocument(Box::new(staged.clone())))?;
        if self.config.update_links_on_save {
            self.links.save_links_in(txn, &staged)?;
        }
        *doc = staged;
        Ok(())
    }

    /// The committed document with this identity, if any.
    #[must_use]
    pub fn load(&self, reference: &DocumentReference, ctx: &Context) -> Option<Document> {
        trace!(document = %reference, user = ctx.user(), "load");
        self.txn.snapshot().document_by_reference(reference).cloned()
    }

    /// Whether a document with this identity is committed.
    #[must_use]
    pub fn exists(&self, reference: &DocumentReference, ctx: &Context) -> bool {
        trace!(document = %reference, user = ctx.user(), "exists");
        self.txn
            .snapshot()
            .document_by_reference(reference)
            .is_some()
    }

    /// Deletes a document with its lock and links in its own transaction.
    ///
    /// Deleting an absent document succeeds. A mapping registered from the
    /// deleted document is unregistered.
    ///
    /// # Errors
    ///
    /// Returns contention or a backend error if the commit fails.
    pub fn delete(&self, reference: &DocumentReference, ctx: &Context) -> StorageResult<()> {
        let hosted_class = self
            .txn
            .snapshot()
            .document_by_reference(reference)
            .and_then(|d| d.class.as_ref().map(|c| c.name.clone()));

        self.txn
            .transaction(|txn| self.delete_in(txn, reference, ctx))?;

        if let Some(class_name) = hosted_class {
            self.registry.unregister_from_document(reference, &class_name);
        }
        Ok(())
    }

    /// Stages deletion of a document, its lock and its links in `txn`.
    ///
    /// # Errors
    ///
    /// Returns an invalid operation error if `txn` has ended.
    pub fn delete_in(
        &self,
        txn: &mut Transaction,
        reference: &DocumentReference,
        ctx: &Context,
    ) -> StorageResult<()> {
        trace!(document = %reference, user = ctx.user(), "delete");
        let id = reference.id();
        txn.ensure_active()?;
        txn.push(Mutation::DeleteDocument(id))?;
        txn.push(Mutation::DeleteLock(id))?;
        self.links.delete_links_in(txn, id)
    }

    /// Full names of the class-hosting documents in `ctx`'s wiki, sorted.
    #[must_use]
    pub fn class_list(&self, ctx: &Context) -> Vec<String> {
        let tables = self.txn.snapshot();
        tables
            .documents_in(ctx.wiki())
            .filter(|d| d.class.is_some() && !d.reference.is_translation())
            .map(Document::full_name)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Language codes of the stored translations of a page, sorted.
    ///
    /// The language of `reference` itself is ignored; the default
    /// document is never listed.
    #[must_use]
    pub fn translation_list(&self, reference: &DocumentReference, ctx: &Context) -> Vec<String> {
        trace!(document = %reference, user = ctx.user(), "translation list");
        let tables = self.txn.snapshot();
        tables
            .documents_in(reference.wiki())
            .filter(|d| d.reference.same_page(reference) && d.reference.is_translation())
            .map(|d| d.reference.language().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
