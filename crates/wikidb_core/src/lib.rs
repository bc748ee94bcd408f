//! # wikidb core
//!
//! Storage core of a wiki engine.
//!
//! This crate provides:
//! - A document model: pages, translations, attached objects and classes
//! - Journal-backed transactions with snapshot reads
//! - [`DocumentStore`] for document CRUD
//! - [`QueryExecutor`] for parameterised searches
//! - [`LockManager`] for advisory edit locks
//! - [`LinkIndex`] for forward links and backlinks
//! - [`ClassMappingRegistry`] for typed projections of class properties
//!
//! [`WikiStore`] ties them together over one store directory.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod database;
mod dir;
mod document;
mod documents;
mod error;
mod journal;
mod links;
mod locks;
mod mapping;
mod query;
mod tables;
mod transaction;
mod types;

pub use config::Config;
pub use context::{Context, RightService};
pub use database::{StoreStats, WikiStore};
pub use document::{
    BaseObject, ClassDefinition, Document, DocumentReference, PropertyDefinition, PropertyType,
};
pub use documents::DocumentStore;
pub use error::{ErrorKind, StorageError, StorageResult};
pub use journal::{Journal, JournalRecord, JournalRecordRef};
pub use links::{extract_links, Link, LinkIndex};
pub use locks::{Lock, LockManager};
pub use mapping::{
    parse_descriptor, validate_descriptor, ClassMapping, ClassMappingRegistry, ColumnType,
    MappedColumn,
};
pub use query::{normalize_clause, CompareOp, Condition, Query, QueryExecutor, QueryOptions};
pub use tables::{Mutation, Tables};
pub use transaction::{Transaction, TransactionManager, TransactionState};
pub use types::{DocumentId, SequenceNumber, TransactionId};
pub use wikidb_codec::Value;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
