//! Runtime registry of custom class mappings.
//!
//! A class may declare a mapping descriptor projecting some of its
//! properties into typed columns. Registered projections serve two
//! purposes: saves check object values against the column types, and
//! queries run with `custom_mapping` may filter and sort on
//! `Class.Name.property` columns.
//!
//! Mappings registered from a class-hosting document apply to that
//! document's wiki only; a class of the same name in another wiki is a
//! different class. Mappings registered directly from a definition apply
//! store-wide, in every wiki without its own mapping of that class. The
//! registry lives next to the store and is rebuilt from the class-hosting
//! documents on open.

mod descriptor;

pub use descriptor::{parse_descriptor, validate_descriptor, ColumnType, MappedColumn};

use crate::context::Context;
use crate::document::{BaseObject, ClassDefinition, Document, DocumentReference};
use crate::error::{StorageError, StorageResult};
use crate::transaction::TransactionManager;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// An active projection of one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMapping {
    /// Mapped class.
    pub class_name: String,
    /// Descriptor text the columns were parsed from.
    pub descriptor: String,
    /// Columns in descriptor order.
    pub columns: Vec<MappedColumn>,
    /// Hosting document, when registered from one.
    pub origin: Option<DocumentReference>,
}

impl ClassMapping {
    /// Column for a property, if mapped.
    #[must_use]
    pub fn column(&self, property: &str) -> Option<&MappedColumn> {
        self.columns.iter().find(|c| c.property == property)
    }

    /// Wiki the mapping is scoped to; `None` for store-wide mappings.
    #[must_use]
    pub fn wiki(&self) -> Option<&str> {
        self.origin.as_ref().map(DocumentReference::wiki)
    }

    fn key(&self) -> MappingKey {
        MappingKey::new(self.wiki(), &self.class_name)
    }
}

/// Registry slot: a class name, optionally scoped to one wiki.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct MappingKey {
    wiki: Option<String>,
    class_name: String,
}

impl MappingKey {
    fn new(wiki: Option<&str>, class_name: &str) -> Self {
        Self {
            wiki: wiki.map(str::to_string),
            class_name: class_name.to_string(),
        }
    }
}

impl fmt::Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.wiki {
            Some(wiki) => write!(f, "{wiki}:{}", self.class_name),
            None => f.write_str(&self.class_name),
        }
    }
}

/// Registry of active class mappings.
pub struct ClassMappingRegistry {
    txn: Arc<TransactionManager>,
    mappings: RwLock<HashMap<MappingKey, ClassMapping>>,
}

impl ClassMappingRegistry {
    pub(crate) fn new(txn: Arc<TransactionManager>) -> Self {
        Self {
            txn,
            mappings: RwLock::new(HashMap::new()),
        }
    }

    /// Checks `descriptor` against `class` without registering anything.
    ///
    /// # Errors
    ///
    /// Returns a mapping mismatch describing the first problem found.
    pub fn validate_mapping(
        &self,
        class: &ClassDefinition,
        descriptor: &str,
    ) -> StorageResult<Vec<MappedColumn>> {
        validate_descriptor(class, descriptor)
    }

    /// Whether `descriptor` is a valid mapping for `class`.
    #[must_use]
    pub fn is_mapping_valid(&self, class: &ClassDefinition, descriptor: &str) -> bool {
        self.validate_mapping(class, descriptor).is_ok()
    }

    /// Activates the class's own descriptor in every wiki.
    ///
    /// Returns `false` if the class declares no mapping.
    ///
    /// # Errors
    ///
    /// Returns a mapping mismatch if the descriptor is invalid; any
    /// previous registration stays in place.
    pub fn register(&self, class: &ClassDefinition) -> StorageResult<bool> {
        self.register_with_origin(class, None)
    }

    /// Activates the mapping of the class hosted by `doc`, in `doc`'s wiki.
    ///
    /// Returns `false` if the document hosts no class or the class has no
    /// mapping.
    ///
    /// # Errors
    ///
    /// Returns a mapping mismatch if the descriptor is invalid.
    pub fn register_from_document(&self, doc: &Document) -> StorageResult<bool> {
        match &doc.class {
            Some(class) => self.register_with_origin(class, Some(doc.reference.clone())),
            None => Ok(false),
        }
    }

    fn register_with_origin(
        &self,
        class: &ClassDefinition,
        origin: Option<DocumentReference>,
    ) -> StorageResult<bool> {
        let Some(descriptor) = class.custom_mapping.as_deref().filter(|_| class.has_custom_mapping())
        else {
            return Ok(false);
        };
        let columns = self.validate_mapping(class, descriptor)?;
        let mapping = ClassMapping {
            class_name: class.name.clone(),
            descriptor: descriptor.to_string(),
            columns,
            origin,
        };
        let key = mapping.key();
        info!(
            class = %key,
            columns = mapping.columns.len(),
            "registered class mapping"
        );
        self.mappings.write().insert(key, mapping);
        Ok(true)
    }

    /// Registers the mapping of every class-hosting document in every wiki.
    ///
    /// Invalid descriptors are logged and skipped. Returns the number of
    /// mappings registered.
    pub fn register_all(&self, ctx: &Context) -> usize {
        let tables = self.txn.snapshot();
        let mut registered = 0;
        for doc in tables.documents().filter(|d| d.class.is_some()) {
            match self.register_from_document(doc) {
                Ok(true) => registered += 1,
                Ok(false) => {}
                Err(err) => warn!(document = %doc.reference, error = %err, "skipping invalid class mapping"),
            }
        }
        info!(wiki = ctx.wiki(), registered, "class mappings loaded");
        registered
    }

    /// Brings the registry in line with the committed class documents.
    ///
    /// Re-registers descriptors that changed and drops document-backed
    /// mappings whose class vanished or lost its mapping. Mappings
    /// registered directly from a class definition are left alone.
    /// Returns the number of mappings added, changed or dropped.
    pub fn refresh_all(&self, ctx: &Context) -> usize {
        let tables = self.txn.snapshot();
        let mut current: HashMap<MappingKey, &Document> = HashMap::new();
        for doc in tables.documents() {
            if let Some(class) = doc.class.as_ref().filter(|c| c.has_custom_mapping()) {
                current.insert(MappingKey::new(Some(doc.reference.wiki()), &class.name), doc);
            }
        }

        let stale: Vec<MappingKey> = self
            .mappings
            .read()
            .iter()
            .filter(|(key, m)| m.origin.is_some() && !current.contains_key(*key))
            .map(|(key, _)| key.clone())
            .collect();
        let mut changes = stale.len();
        {
            let mut mappings = self.mappings.write();
            for key in &stale {
                mappings.remove(key);
            }
        }

        for (key, doc) in current {
            let unchanged = self.mappings.read().get(&key).is_some_and(|m| {
                doc.class.as_ref().and_then(|c| c.custom_mapping.as_deref())
                    == Some(m.descriptor.as_str())
            });
            if unchanged {
                continue;
            }
            match self.register_from_document(doc) {
                Ok(_) => changes += 1,
                Err(err) => {
                    warn!(document = %doc.reference, error = %err, "dropping invalid class mapping");
                    if self.mappings.write().remove(&key).is_some() {
                        changes += 1;
                    }
                }
            }
        }

        info!(wiki = ctx.wiki(), changes, "class mappings refreshed");
        changes
    }

    /// Deactivates a store-wide mapping. Returns whether one was registered.
    pub fn unregister(&self, class_name: &str) -> bool {
        self.remove(&MappingKey::new(None, class_name))
    }

    /// Deactivates the mapping of `class_name` registered from `origin`.
    ///
    /// A mapping of that class registered from any other source is left
    /// in place. Returns whether one was removed.
    pub fn unregister_from_document(&self, origin: &DocumentReference, class_name: &str) -> bool {
        let key = MappingKey::new(Some(origin.wiki()), class_name);
        let owned = self
            .mappings
            .read()
            .get(&key)
            .is_some_and(|m| m.origin.as_ref() == Some(origin));
        owned && self.remove(&key)
    }

    fn remove(&self, key: &MappingKey) -> bool {
        let removed = self.mappings.write().remove(key).is_some();
        if removed {
            info!(class = %key, "unregistered class mapping");
        }
        removed
    }

    /// Whether a class has an active mapping in `wiki`.
    #[must_use]
    pub fn is_registered(&self, wiki: &str, class_name: &str) -> bool {
        self.mapping(wiki, class_name).is_some()
    }

    /// The mapping of a class in effect in `wiki`: the wiki's own, else a
    /// store-wide one.
    #[must_use]
    pub fn mapping(&self, wiki: &str, class_name: &str) -> Option<ClassMapping> {
        let mappings = self.mappings.read();
        Self::resolve(&mappings, wiki, class_name).cloned()
    }

    fn resolve<'a>(
        mappings: &'a HashMap<MappingKey, ClassMapping>,
        wiki: &str,
        class_name: &str,
    ) -> Option<&'a ClassMapping> {
        mappings
            .get(&MappingKey::new(Some(wiki), class_name))
            .or_else(|| mappings.get(&MappingKey::new(None, class_name)))
    }

    /// Mapped property names of a class in `wiki`, in descriptor order;
    /// empty if the class is not registered there.
    #[must_use]
    pub fn mapped_properties(&self, wiki: &str, class_name: &str) -> Vec<String> {
        self.mapping(wiki, class_name)
            .map(|m| m.columns.into_iter().map(|c| c.property).collect())
            .unwrap_or_default()
    }

    /// All registered classes, sorted: `wiki:Space.Class` for wiki-scoped
    /// mappings, `Space.Class` for store-wide ones.
    #[must_use]
    pub fn registered_classes(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.mappings.read().keys().cloned().collect();
        keys.sort();
        keys.iter().map(MappingKey::to_string).collect()
    }

    /// Checks the mapped values of an object stored in `wiki` against the
    /// column types in effect there.
    ///
    /// Objects of unregistered classes always pass.
    ///
    /// # Errors
    ///
    /// Returns a mapping mismatch naming the first offending property.
    pub fn check_object(&self, wiki: &str, object: &BaseObject) -> StorageResult<()> {
        let mappings = self.mappings.read();
        let Some(mapping) = Self::resolve(&mappings, wiki, &object.class_name) else {
            return Ok(());
        };
        for column in &mapping.columns {
            if let Some(value) = object.get(&column.property) {
                if !column.column_type.accepts(value) {
                    return Err(StorageError::mapping_mismatch(
                        &object.class_name,
                        format!(
                            "object {} property `{}` holds {} but is mapped as {} in wiki {}",
                            object.number,
                            column.property,
                            value.type_name(),
                            column.column_type,
                            wiki
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ClassMappingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassMappingRegistry")
            .field("registered", &self.registered_classes())
            .finish_non_exhaustive()
    }
}
