//! Custom mapping descriptors.
//!
//! A descriptor lists the class properties projected into typed columns:
//!
//! ```text
//! category:string, rating:integer; published:date
//! ```
//!
//! Entries are separated by `,` or `;`; whitespace around names and types
//! is ignored.

use crate::document::{ClassDefinition, PropertyType};
use crate::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use wikidb_codec::Value;

/// Column type named in a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// `string`
    String,
    /// `text`
    Text,
    /// `integer`
    Integer,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `boolean`
    Boolean,
    /// `date`
    Date,
}

impl ColumnType {
    /// Whether a class property of type `kind` can be stored in this column.
    #[must_use]
    pub fn is_compatible(self, kind: PropertyType) -> bool {
        use PropertyType as P;
        match self {
            Self::String | Self::Text => matches!(kind, P::String | P::TextArea),
            Self::Integer => kind == P::Integer,
            Self::Long => matches!(kind, P::Long | P::Integer),
            Self::Float => kind == P::Float,
            Self::Double => matches!(kind, P::Double | P::Float),
            Self::Boolean => kind == P::Boolean,
            Self::Date => kind == P::Date,
        }
    }

    /// Whether `value` can be stored in this column.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        let storage = match self {
            Self::String => PropertyType::String,
            Self::Text => PropertyType::TextArea,
            Self::Integer => PropertyType::Integer,
            Self::Long => PropertyType::Long,
            Self::Float => PropertyType::Float,
            Self::Double => PropertyType::Double,
            Self::Boolean => PropertyType::Boolean,
            Self::Date => PropertyType::Date,
        };
        storage.accepts(value)
    }

    /// Descriptor keyword.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Date => "date",
        }
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(Self::String),
            "text" => Ok(Self::Text),
            "integer" => Ok(Self::Integer),
            "long" => Ok(Self::Long),
            "float" => Ok(Self::Float),
            "double" => Ok(Self::Double),
            "boolean" => Ok(Self::Boolean),
            "date" => Ok(Self::Date),
            other => Err(format!("unknown column type `{other}`")),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One projected property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedColumn {
    /// Class property name.
    pub property: String,
    /// Declared column type.
    pub column_type: ColumnType,
}

/// Parses a descriptor without looking at any class.
///
/// # Errors
///
/// Returns a mapping mismatch for an empty descriptor, an entry without
/// `:`, an empty name or an unknown type.
pub fn parse_descriptor(class_name: &str, descriptor: &str) -> StorageResult<Vec<MappedColumn>> {
    let mut columns = Vec::new();
    for entry in descriptor.split(|c: char| c == ',' || c == ';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let Some((property, kind)) = entry.split_once(':') else {
            return Err(StorageError::mapping_mismatch(
                class_name,
                format!("entry `{entry}` is not of the form property:type"),
            ));
        };
        let property = property.trim();
        if property.is_empty() {
            return Err(StorageError::mapping_mismatch(
                class_name,
                format!("entry `{entry}` has no property name"),
            ));
        }
        let column_type = kind
            .trim()
            .parse::<ColumnType>()
            .map_err(|message| StorageError::mapping_mismatch(class_name, message))?;
        columns.push(MappedColumn {
            property: property.to_string(),
            column_type,
        });
    }

    if columns.is_empty() {
        return Err(StorageError::mapping_mismatch(
            class_name,
            "descriptor maps no properties",
        ));
    }
    Ok(columns)
}

/// Parses `descriptor` and checks it against `class`.
///
/// # Errors
///
/// Returns a mapping mismatch on a syntax error, an unknown or duplicated
/// property, a list property, or a column type the property cannot hold.
pub fn validate_descriptor(
    class: &ClassDefinition,
    descriptor: &str,
) -> StorageResult<Vec<MappedColumn>> {
    let columns = parse_descriptor(&class.name, descriptor)?;
    let mut seen = HashSet::new();

    for column in &columns {
        if !seen.insert(column.property.as_str()) {
            return Err(StorageError::mapping_mismatch(
                &class.name,
                format!("property `{}` is mapped twice", column.property),
            ));
        }
        let Some(definition) = class.property(&column.property) else {
            return Err(StorageError::mapping_mismatch(
                &class.name,
                format!("class has no property `{}`", column.property),
            ));
        };
        if definition.kind == PropertyType::List {
            return Err(StorageError::mapping_mismatch(
                &class.name,
                format!("list property `{}` cannot be mapped", column.property),
            ));
        }
        if !column.column_type.is_compatible(definition.kind) {
            return Err(StorageError::mapping_mismatch(
                &class.name,
                format!(
                    "property `{}` of type {:?} cannot be stored as {}",
                    column.property, definition.kind, column.column_type
                ),
            ));
        }
    }
    Ok(columns)
}
