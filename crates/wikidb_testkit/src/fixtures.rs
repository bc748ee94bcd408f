//! Store fixtures and sample documents.

use crate::faults::{FaultController, FaultyBackend};
use std::path::Path;
use tempfile::TempDir;
use wikidb_core::{
    BaseObject, ClassDefinition, Config, Context, Document, DocumentReference, PropertyType,
    WikiStore,
};
use wikidb_storage::InMemoryBackend;

/// Main wiki of every fixture store.
pub const WIKI: &str = "xwiki";

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: WikiStore,
    temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a new in-memory test store.
    pub fn memory() -> Self {
        Self {
            store: WikiStore::open_in_memory().expect("Failed to open in-memory store"),
            temp_dir: None,
        }
    }

    /// Creates a new store in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = WikiStore::open(temp_dir.path()).expect("Failed to open file store");
        Self {
            store,
            temp_dir: Some(temp_dir),
        }
    }

    /// Creates an in-memory store whose journal fails on demand.
    pub fn faulty() -> (Self, FaultController) {
        let backend = FaultyBackend::new(Box::new(InMemoryBackend::new()));
        let controller = backend.controller();
        let store = WikiStore::open_with_backend(Config::default(), Box::new(backend))
            .expect("Failed to open faulty store");
        (
            Self {
                store,
                temp_dir: None,
            },
            controller,
        )
    }

    /// Closes and reopens a file store, replaying its journal.
    ///
    /// # Panics
    ///
    /// Panics for in-memory stores.
    #[must_use]
    pub fn reopen(self) -> Self {
        let temp_dir = self.temp_dir.expect("Only file stores can be reopened");
        drop(self.store);
        let store = WikiStore::open(temp_dir.path()).expect("Failed to reopen store");
        Self {
            store,
            temp_dir: Some(temp_dir),
        }
    }

    /// Store directory, if file-based.
    pub fn path(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    /// A guest context on the main wiki.
    pub fn ctx(&self) -> Context {
        self.store.context()
    }
}

impl std::ops::Deref for TestStore {
    type Target = WikiStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&WikiStore) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store.store)
}

/// Runs a test with a temporary file-based store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&WikiStore, &Path) -> R,
{
    let test_store = TestStore::file();
    let path = test_store.path().expect("File store should have a path");
    f(&test_store.store, path)
}

/// Reference to a default-language page on the main wiki.
pub fn reference(space: &str, name: &str) -> DocumentReference {
    DocumentReference::new(WIKI, space, name)
}

/// An unsaved page on the main wiki.
pub fn page(space: &str, name: &str, content: &str) -> Document {
    Document::new(reference(space, name)).with_content(content)
}

/// The `Blog.PostClass` class with `category`, `rating` and `tags`.
pub fn blog_post_class(mapping: Option<&str>) -> ClassDefinition {
    let class = ClassDefinition::new("Blog.PostClass")
        .with_property("category", PropertyType::String)
        .with_property("rating", PropertyType::Integer)
        .with_property("tags", PropertyType::List);
    match mapping {
        Some(descriptor) => class.with_custom_mapping(descriptor),
        None => class,
    }
}

/// The document hosting [`blog_post_class`].
pub fn blog_post_class_document(mapping: Option<&str>) -> Document {
    Document::new(reference("Blog", "PostClass")).with_class(blog_post_class(mapping))
}

/// A blog post page carrying one `Blog.PostClass` object.
pub fn blog_post(name: &str, category: &str, rating: i64) -> Document {
    page("Blog", name, "").with_object(
        BaseObject::new("Blog.PostClass", 0)
            .with("category", category)
            .with("rating", rating),
    )
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A store with `count` pages `Main.Page000`.. each linking to the
    /// next one.
    pub fn linked_chain(count: usize) -> TestStore {
        let test_store = TestStore::memory();
        let ctx = test_store.ctx();
        for i in 0..count {
            let mut doc = page(
                "Main",
                &format!("Page{i:03}"),
                &format!("next: [[Page{:03}]]", i + 1),
            );
            test_store
                .documents()
                .save(&mut doc, &ctx)
                .expect("Failed to save page");
        }
        test_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_starts_with_main_wiki() {
        with_temp_store(|store| {
            assert_eq!(store.wikis(), vec![WIKI]);
        });
    }

    #[test]
    fn file_store_reopens() {
        let test_store = TestStore::file();
        let ctx = test_store.ctx();
        let mut doc = page("Main", "A", "");
        test_store.documents().save(&mut doc, &ctx).unwrap();

        let test_store = test_store.reopen();
        assert!(test_store
            .documents()
            .exists(&reference("Main", "A"), &test_store.ctx()));
    }

    #[test]
    fn linked_chain_links_forward() {
        let test_store = scenarios::linked_chain(3);
        let backlinks = test_store
            .links()
            .backlinks(&reference("Main", "Page001"), &test_store.ctx());
        assert_eq!(backlinks, vec!["Main.Page000"]);
    }
}
