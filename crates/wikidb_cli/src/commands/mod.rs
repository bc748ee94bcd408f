//! CLI command implementations.

pub mod backlinks;
pub mod compact;
pub mod inspect;
pub mod search;

use std::path::Path;
use wikidb_core::{Config, WikiStore};

/// Opens an existing store; never creates one.
pub fn open_existing(path: &Path) -> Result<WikiStore, Box<dyn std::error::Error>> {
    if !path.join("journal.log").exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    Ok(WikiStore::open_with_config(
        path,
        Config::default().create_if_missing(false),
    )?)
}
