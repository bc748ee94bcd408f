//! Runtime-defined schemas.

use serde::{Deserialize, Serialize};
use wikidb_codec::Value;

/// Type of a class property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    /// Short text.
    String,
    /// Long text.
    TextArea,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    Long,
    /// Single precision number.
    Float,
    /// Double precision number.
    Double,
    /// Boolean flag.
    Boolean,
    /// Timestamp, stored as epoch milliseconds.
    Date,
    /// List of values.
    List,
}

impl PropertyType {
    /// Whether `value` may be stored in a property of this type.
    ///
    /// `Null` is always accepted; integers are accepted by the floating
    /// types.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::String | Self::TextArea, Value::Text(_)) => true,
            (Self::Integer | Self::Long | Self::Date, Value::Integer(_)) => true,
            (Self::Float | Self::Double, Value::Float(_) | Value::Integer(_)) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::List, Value::List(_)) => true,
            _ => false,
        }
    }
}

/// One typed property of a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    /// Property name.
    pub name: String,
    /// Property type.
    pub kind: PropertyType,
}

/// A named schema hosted by a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDefinition {
    /// Class name: the full name of the hosting document.
    pub name: String,
    /// Properties in declaration order.
    pub properties: Vec<PropertyDefinition>,
    /// Custom mapping descriptor, e.g. `category:string,rating:integer`.
    pub custom_mapping: Option<String>,
}

impl ClassDefinition {
    /// Creates a class with no properties.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            custom_mapping: None,
        }
    }

    /// Adds a property (builder style).
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, kind: PropertyType) -> Self {
        self.properties.push(PropertyDefinition {
            name: name.into(),
            kind,
        });
        self
    }

    /// Sets the custom mapping descriptor (builder style).
    #[must_use]
    pub fn with_custom_mapping(mut self, descriptor: impl Into<String>) -> Self {
        self.custom_mapping = Some(descriptor.into());
        self
    }

    /// Looks up a property definition.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Whether a non-blank custom mapping descriptor is set.
    #[must_use]
    pub fn has_custom_mapping(&self) -> bool {
        self.custom_mapping
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty())
    }
}
