//! Execution context passed to every store operation.

use crate::document::DocumentReference;
use std::fmt;
use std::sync::Arc;

/// Permission decisions, supplied by the embedding application.
///
/// The store only consults it for queries run with `check_right`.
pub trait RightService: Send + Sync {
    /// Whether `user` may view `document`.
    fn can_view(&self, user: &str, document: &DocumentReference) -> bool;
}

/// The acting wiki and identity for an operation.
#[derive(Clone)]
pub struct Context {
    wiki: String,
    user: String,
    rights: Option<Arc<dyn RightService>>,
}

impl Context {
    /// Guest user name used when none is set.
    pub const GUEST: &'static str = "XWiki.XWikiGuest";

    /// Creates a guest context on `wiki`.
    pub fn new(wiki: impl Into<String>) -> Self {
        Self {
            wiki: wiki.into(),
            user: Self::GUEST.to_string(),
            rights: None,
        }
    }

    /// Sets the acting user.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Attaches the permission collaborator.
    #[must_use]
    pub fn with_rights(mut self, rights: Arc<dyn RightService>) -> Self {
        self.rights = Some(rights);
        self
    }

    /// Current wiki.
    #[must_use]
    pub fn wiki(&self) -> &str {
        &self.wiki
    }

    /// Acting user.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Permission collaborator, if one is attached.
    #[must_use]
    pub fn rights(&self) -> Option<&dyn RightService> {
        self.rights.as_deref()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("wiki", &self.wiki)
            .field("user", &self.user)
            .field("rights", &self.rights.is_some())
            .finish()
    }
}
