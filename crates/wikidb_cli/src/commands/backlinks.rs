//! Backlinks command implementation.

use std::path::Path;
use wikidb_core::{Context, DocumentReference};

/// Full names of the pages in the wiki linking to `reference`.
pub fn collect(
    path: &Path,
    reference: &str,
    wiki: Option<&str>,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;
    let ctx = match wiki {
        Some(wiki) => Context::new(wiki),
        None => store.context(),
    };
    let target = DocumentReference::parse(reference, ctx.wiki(), &store.config().default_space)?;
    Ok(store.links().backlinks(&target, &ctx))
}

/// Runs the backlinks command.
pub fn run(
    path: &Path,
    reference: &str,
    wiki: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let names = collect(path, reference, wiki)?;
    if names.is_empty() {
        println!("No pages link to {reference}");
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wikidb_core::{Document, WikiStore};

    #[test]
    fn lists_linking_pages() {
        let dir = tempdir().unwrap();
        {
            let store = WikiStore::open(dir.path()).unwrap();
            let ctx = store.context();
            for (name, content) in [("B", "[[Target]]"), ("A", "see [Main.Target]"), ("C", "")] {
                let mut doc = Document::new(DocumentReference::new("xwiki", "Main", name))
                    .with_content(content);
                store.documents().save(&mut doc, &ctx).unwrap();
            }
        }

        assert_eq!(
            collect(dir.path(), "Main.Target", None).unwrap(),
            vec!["Main.A", "Main.B"]
        );
        assert_eq!(
            collect(dir.path(), "Target", None).unwrap(),
            vec!["Main.A", "Main.B"]
        );
        assert!(collect(dir.path(), "Main.C", None).unwrap().is_empty());
    }
}
