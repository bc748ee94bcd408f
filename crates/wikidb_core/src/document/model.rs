//! The document record.

use crate::document::{BaseObject, ClassDefinition, DocumentReference};
use crate::types::DocumentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A wiki page: content, metadata, attached objects and an optional class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identity of this revision group.
    pub reference: DocumentReference,
    /// Page title.
    pub title: String,
    /// Page body in wiki syntax.
    pub content: String,
    /// Full name of the parent page, empty for none.
    pub parent: String,
    /// Last author.
    pub author: String,
    /// Language of the default document, e.g. `en`.
    pub default_language: String,
    /// Creation timestamp.
    pub creation_date: DateTime<Utc>,
    /// Last modification timestamp.
    pub update_date: DateTime<Utc>,
    /// Attached objects, in attachment order.
    pub objects: Vec<BaseObject>,
    /// Class hosted by this document, if any.
    pub class: Option<ClassDefinition>,
    /// Revision marker, assigned by the store on save.
    pub revision: u64,
}

impl Document {
    /// Creates an unsaved, empty document.
    pub fn new(reference: DocumentReference) -> Self {
        let now = Utc::now();
        Self {
            reference,
            title: String::new(),
            content: String::new(),
            parent: String::new(),
            author: String::new(),
            default_language: String::new(),
            creation_date: now,
            update_date: now,
            objects: Vec::new(),
            class: None,
            revision: 0,
        }
    }

    /// Sets the content (builder style).
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Sets the title (builder style).
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Attaches an object (builder style).
    #[must_use]
    pub fn with_object(mut self, object: BaseObject) -> Self {
        self.objects.push(object);
        self
    }

    /// Hosts a class (builder style).
    #[must_use]
    pub fn with_class(mut self, class: ClassDefinition) -> Self {
        self.class = Some(class);
        self
    }

    /// Row identifier.
    #[must_use]
    pub fn id(&self) -> DocumentId {
        self.reference.id()
    }

    /// `Space.Name`.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.reference.full_name()
    }

    /// Attached objects of one class.
    pub fn objects_of<'a>(&'a self, class_name: &'a str) -> impl Iterator<Item = &'a BaseObject> {
        self.objects.iter().filter(move |o| o.class_name == class_name)
    }

    /// The lowest-numbered object of a class.
    #[must_use]
    pub fn first_object(&self, class_name: &str) -> Option<&BaseObject> {
        self.objects
            .iter()
            .filter(|o| o.class_name == class_name)
            .min_by_key(|o| o.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> Document {
        Document::new(DocumentReference::new("xwiki", "Blog", "P1"))
            .with_object(BaseObject::new("Blog.PostClass", 2).with("rating", 2))
            .with_object(BaseObject::new("Blog.TagClass", 0))
            .with_object(BaseObject::new("Blog.PostClass", 1).with("rating", 1))
    }

    #[test]
    fn first_object_is_lowest_number() {
        let doc = post();
        let class_name = String::from("Blog.PostClass");
        let first = doc.first_object(&class_name);
        drop(class_name);
        assert_eq!(first.map(|o| o.number), Some(1));
        assert!(doc.first_object("Missing.Class").is_none());
    }

    #[test]
    fn objects_of_keeps_attachment_order() {
        let doc = post();
        let numbers: Vec<u32> = doc.objects_of("Blog.PostClass").map(|o| o.number).collect();
        assert_eq!(numbers, vec![2, 1]);
    }
}
