//! Document model: identities, documents, attached objects and classes.

mod class;
mod model;
mod object;
mod reference;

pub use class::{ClassDefinition, PropertyDefinition, PropertyType};
pub use model::Document;
pub use object::BaseObject;
pub use reference::DocumentReference;
