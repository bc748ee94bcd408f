//! Forward link rows and backlink lookup.
//!
//! Each document owns one ordered set of forward links, replaced wholesale
//! whenever its content is saved. Backlinks are not stored; they come from
//! scanning the forward rows of the committed snapshot, so they can never
//! disagree with them.

mod extract;

pub use extract::extract_links;

use crate::context::Context;
use crate::document::{Document, DocumentReference};
use crate::error::StorageResult;
use crate::tables::Mutation;
use crate::transaction::{Transaction, TransactionManager};
use crate::types::DocumentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// One forward link row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Id of the linking document.
    pub source: DocumentId,
    /// Identity of the linking document.
    pub source_reference: DocumentReference,
    /// Linked page.
    pub target: DocumentReference,
}

impl Link {
    /// A link from `source` to `target`.
    pub fn new(source: &DocumentReference, target: DocumentReference) -> Self {
        Self {
            source: source.id(),
            source_reference: source.clone(),
            target,
        }
    }
}

/// Maintains forward links and answers backlink queries.
#[derive(Debug, Clone)]
pub struct LinkIndex {
    txn: Arc<TransactionManager>,
}

impl LinkIndex {
    pub(crate) fn new(txn: Arc<TransactionManager>) -> Self {
        Self { txn }
    }

    /// Outgoing links of a document as of its last committed save.
    #[must_use]
    pub fn links(&self, document_id: DocumentId) -> Vec<Link> {
        self.txn.snapshot().links(document_id).to_vec()
    }

    /// Full names of the documents in `ctx`'s wiki that link to `target`.
    ///
    /// Translations of the target count as the target. Results are sorted
    /// and distinct.
    #[must_use]
    pub fn backlinks(&self, target: &DocumentReference, ctx: &Context) -> Vec<String> {
        let tables = self.txn.snapshot();
        tables
            .all_links()
            .filter(|link| link.target.same_page(target))
            .filter(|link| link.source_reference.wiki() == ctx.wiki())
            .map(|link| link.source_reference.full_name())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Replaces `doc`'s forward links in their own transaction.
    ///
    /// # Errors
    ///
    /// Returns contention or a backend error if the commit fails.
    pub fn save_links(&self, doc: &Document) -> StorageResult<()> {
        self.txn.transaction(|txn| self.save_links_in(txn, doc))
    }

    /// Stages a full replacement of `doc`'s forward links in `txn`.
    ///
    /// # Errors
    ///
    /// Returns an invalid operation error if `txn` has ended.
    pub fn save_links_in(&self, txn: &mut Transaction, doc: &Document) -> StorageResult<()> {
        let source = &doc.reference;
        let links = extract_links(doc)
            .into_iter()
            .map(|target| Link::new(source, target))
            .collect();
        txn.push(Mutation::ReplaceLinks {
            source: source.id(),
            links,
        })
    }

    /// Drops a document's forward links in their own transaction.
    ///
    /// # Errors
    ///
    /// Returns contention or a backend error if the commit fails.
    pub fn delete_links(&self, document_id: DocumentId) -> StorageResult<()> {
        self.txn
            .transaction(|txn| self.delete_links_in(txn, document_id))
    }

    /// Stages removal of a document's forward links in `txn`.
    ///
    /// # Errors
    ///
    /// Returns an invalid operation error if `txn` has ended.
    pub fn delete_links_in(&self, txn: &mut Transaction, document_id: DocumentId) -> StorageResult<()> {
        txn.push(Mutation::DeleteLinks(document_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_index() -> LinkIndex {
        LinkIndex::new(Arc::new(TransactionManager::in_memory_with_wiki("xwiki")))
    }

    fn page(name: &str, content: &str) -> Document {
        Document::new(DocumentReference::new("xwiki", "Main", name)).with_content(content)
    }

    #[test]
    fn save_and_read_forward_links() {
        let index = create_index();
        let a = page("A", "[[B]] [[Sandbox.C]]");
        index.save_links(&a).unwrap();

        let targets: Vec<_> = index
            .links(a.id())
            .into_iter()
            .map(|l| l.target.full_name())
            .collect();
        assert_eq!(targets, vec!["Main.B", "Sandbox.C"]);
    }

    #[test]
    fn backlinks_follow_replacement() {
        let index = create_index();
        let ctx = Context::new("xwiki");
        let b = DocumentReference::new("xwiki", "Main", "B");

        index.save_links(&page("A", "[[B]]")).unwrap();
        index.save_links(&page("Z", "[[B]]")).unwrap();
        assert_eq!(index.backlinks(&b, &ctx), vec!["Main.A", "Main.Z"]);

        index.save_links(&page("A", "no links any more")).unwrap();
        assert_eq!(index.backlinks(&b, &ctx), vec!["Main.Z"]);
    }

    #[test]
    fn backlinks_ignore_target_language() {
        let index = create_index();
        index.save_links(&page("A", "[[B]]")).unwrap();
        let translated = DocumentReference::new("xwiki", "Main", "B").with_language("fr");
        assert_eq!(
            index.backlinks(&translated, &Context::new("xwiki")),
            vec!["Main.A"]
        );
    }

    #[test]
    fn delete_links_removes_rows() {
        let index = create_index();
        let a = page("A", "[[B]]");
        index.save_links(&a).unwrap();
        index.delete_links(a.id()).unwrap();
        assert!(index.links(a.id()).is_empty());
        assert!(index
            .backlinks(&DocumentReference::new("xwiki", "Main", "B"), &Context::new("xwiki"))
            .is_empty());
    }
}
