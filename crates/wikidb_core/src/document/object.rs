//! Attached class instances.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use wikidb_codec::Value;

/// An instance of a class attached to a document.
///
/// `number` tells several instances of the same class apart and must be
/// unique per class within one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseObject {
    /// Full name of the class document, e.g. `Blog.PostClass`.
    pub class_name: String,
    /// Instance number within the document.
    pub number: u32,
    /// Property values keyed by property name.
    pub properties: BTreeMap<String, Value>,
}

impl BaseObject {
    /// Creates an empty instance.
    pub fn new(class_name: impl Into<String>, number: u32) -> Self {
        Self {
            class_name: class_name.into(),
            number,
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property setter.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a property value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }

    /// Reads a property value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}
