//! Store configuration.

use std::time::Duration;

/// Configuration for opening a wiki store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to flush the journal on every commit.
    pub sync_on_commit: bool,

    /// Name of the main wiki, created on first open.
    pub main_wiki: String,

    /// Space used for references that only name a page.
    pub default_space: String,

    /// Whether saving a document also replaces its forward links.
    pub update_links_on_save: bool,

    /// Longest time a commit waits for the writer lock.
    pub write_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
            main_wiki: "xwiki".to_string(),
            default_space: "Main".to_string(),
            update_links_on_save: true,
            write_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to flush the journal on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the main wiki name.
    #[must_use]
    pub fn main_wiki(mut self, name: impl Into<String>) -> Self {
        self.main_wiki = name.into();
        self
    }

    /// Sets the default space.
    #[must_use]
    pub fn default_space(mut self, space: impl Into<String>) -> Self {
        self.default_space = space.into();
        self
    }

    /// Sets whether saves also refresh the link index.
    #[must_use]
    pub const fn update_links_on_save(mut self, value: bool) -> Self {
        self.update_links_on_save = value;
        self
    }

    /// Sets how long a commit may wait for the writer lock.
    #[must_use]
    pub const fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}
