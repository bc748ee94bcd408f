//! Document identity.

use crate::error::{StorageError, StorageResult};
use crate::types::DocumentId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// The `(wiki, space, name, language)` tuple addressing one document.
///
/// An empty `language` denotes the default-language document, the anchor
/// of its translation group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentReference {
    wiki: String,
    space: String,
    name: String,
    language: String,
}

impl DocumentReference {
    /// Creates a reference to the default-language document.
    pub fn new(wiki: impl Into<String>, space: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            wiki: wiki.into(),
            space: space.into(),
            name: name.into(),
            language: String::new(),
        }
    }

    /// Returns the same reference pointing at the `language` translation.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Returns the default-language reference of this translation group.
    #[must_use]
    pub fn default_language(&self) -> Self {
        self.clone().with_language("")
    }

    /// Parses `wiki:Space.Name`, `Space.Name` or `Name`.
    ///
    /// Missing parts are taken from `default_wiki` and `default_space`. The
    /// space ends at the first `.`, so page names may contain dots.
    ///
    /// # Errors
    ///
    /// Returns a constraint violation if the result is not a valid identity.
    pub fn parse(text: &str, default_wiki: &str, default_space: &str) -> StorageResult<Self> {
        let (wiki, rest) = match text.split_once(':') {
            Some((wiki, rest)) => (wiki, rest),
            None => (default_wiki, text),
        };
        let (space, name) = match rest.split_once('.') {
            Some((space, name)) => (space, name),
            None => (default_space, rest),
        };
        let reference = Self::new(wiki.trim(), space.trim(), name.trim());
        reference.validate()?;
        Ok(reference)
    }

    /// Checks that every part is present and unambiguous.
    ///
    /// # Errors
    ///
    /// Returns a constraint violation naming the offending part.
    pub fn validate(&self) -> StorageResult<()> {
        let fail = |message: &str| Err(StorageError::constraint(self.to_string(), message));
        if self.wiki.is_empty() || self.wiki.contains(':') {
            return fail("wiki name must be non-empty and contain no ':'");
        }
        if self.space.is_empty() || self.space.contains(|c: char| c == '.' || c == ':') {
            return fail("space must be non-empty and contain no '.' or ':'");
        }
        if self.name.is_empty() {
            return fail("page name must be non-empty");
        }
        Ok(())
    }

    /// Wiki name.
    #[must_use]
    pub fn wiki(&self) -> &str {
        &self.wiki
    }

    /// Space name.
    #[must_use]
    pub fn space(&self) -> &str {
        &self.space
    }

    /// Page name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Language code, empty for the default document.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Whether this addresses a translation rather than the default document.
    #[must_use]
    pub fn is_translation(&self) -> bool {
        !self.language.is_empty()
    }

    /// `Space.Name`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.space, self.name)
    }

    /// `wiki:Space.Name`.
    #[must_use]
    pub fn prefixed_full_name(&self) -> String {
        format!("{}:{}.{}", self.wiki, self.space, self.name)
    }

    /// Whether both references name the same page, ignoring language.
    #[must_use]
    pub fn same_page(&self, other: &Self) -> bool {
        self.wiki == other.wiki && self.space == other.space && self.name == other.name
    }

    /// Row identifier derived from the full identity tuple.
    #[must_use]
    pub fn id(&self) -> DocumentId {
        let mut hasher = Sha256::new();
        hasher.update(self.prefixed_full_name().as_bytes());
        hasher.update(b":");
        hasher.update(self.language.as_bytes());
        let digest = hasher.finalize();
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&digest[..8]);
        DocumentId::new(u64::from_be_bytes(raw))
    }
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefixed_full_name())?;
        if self.is_translation() {
            write!(f, " ({})", self.language)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_fills_defaults() {
        let full = DocumentReference::parse("dev:Sandbox.Test", "xwiki", "Main").unwrap();
        assert_eq!(full, DocumentReference::new("dev", "Sandbox", "Test"));

        let relative = DocumentReference::parse("Sandbox.Test", "xwiki", "Main").unwrap();
        assert_eq!(relative.wiki(), "xwiki");

        let bare = DocumentReference::parse("WebHome", "xwiki", "Main").unwrap();
        assert_eq!(bare.full_name(), "Main.WebHome");
    }

    #[test]
    fn page_names_may_contain_dots() {
        let reference = DocumentReference::parse("Doc.Release.1.2", "xwiki", "Main").unwrap();
        assert_eq!(reference.space(), "Doc");
        assert_eq!(reference.name(), "Release.1.2");
    }

    #[test]
    fn parse_rejects_empty_parts() {
        assert!(DocumentReference::parse("Main.", "xwiki", "Main").is_err());
        assert!(DocumentReference::parse(":Main.Page", "xwiki", "Main").is_err());
    }

    #[test]
    fn language_is_part_of_the_id() {
        let base = DocumentReference::new("xwiki", "Main", "WebHome");
        let fr = base.clone().with_language("fr");
        assert_ne!(base.id(), fr.id());
        assert_eq!(base.id(), fr.default_language().id());
        assert!(base.same_page(&fr));
    }

    #[test]
    fn display_marks_translations() {
        let fr = DocumentReference::new("xwiki", "Main", "WebHome").with_language("fr");
        assert_eq!(fr.to_string(), "xwiki:Main.WebHome (fr)");
    }
}
