//! Inspect command implementation.

use serde::Serialize;
use std::path::Path;
use wikidb_core::StoreStats;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Table and journal statistics.
    #[serde(flatten)]
    pub stats: StoreStats,
    /// Class-hosting pages of the main wiki.
    pub classes: Vec<String>,
}

/// Opens the store and gathers its statistics.
pub fn collect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;
    let stats = store.stats()?;
    let classes = store.documents().class_list(&store.context());
    Ok(InspectResult {
        path: path.display().to_string(),
        stats,
        classes,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = collect(path)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    let stats = &result.stats;
    println!("wikidb Store Inspection");
    println!("=======================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Journal:");
    println!("  Size:      {}", format_size(stats.journal_bytes));
    println!("  Sequence:  {}", stats.committed_seq);
    println!();
    println!("Tables:");
    println!("  Documents: {}", stats.documents);
    println!("  Locks:     {}", stats.locks);
    println!("  Links:     {}", stats.links);
    println!();
    println!("Wikis: {}", stats.wikis.join(", "));

    if !stats.mappings.is_empty() {
        println!();
        println!("Mapped classes:");
        for class in &stats.mappings {
            println!("  {class}");
        }
    }
    if !result.classes.is_empty() {
        println!();
        println!("Class pages:");
        for class in &result.classes {
            println!("  {class}");
        }
    }
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wikidb_core::{ClassDefinition, Document, DocumentReference, PropertyType, WikiStore};

    #[test]
    fn collect_reports_tables() {
        let dir = tempdir().unwrap();
        {
            let store = WikiStore::open(dir.path()).unwrap();
            let ctx = store.context();
            let mut class_doc = Document::new(DocumentReference::new("xwiki", "Blog", "PostClass"))
                .with_class(
                    ClassDefinition::new("Blog.PostClass")
                        .with_property("category", PropertyType::String)
                        .with_custom_mapping("category:string"),
                );
            store.documents().save(&mut class_doc, &ctx).unwrap();
            let mut page = Document::new(DocumentReference::new("xwiki", "Main", "A"))
                .with_content("[[B]]");
            store.documents().save(&mut page, &ctx).unwrap();
        }

        let result = collect(dir.path()).unwrap();
        assert_eq!(result.stats.documents, 2);
        assert_eq!(result.stats.links, 1);
        assert_eq!(result.stats.mappings, vec!["xwiki:Blog.PostClass"]);
        assert_eq!(result.classes, vec!["Blog.PostClass"]);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["documents"], 2);
        assert_eq!(json["wikis"][0], "xwiki");
    }

    #[test]
    fn collect_refuses_missing_store() {
        let dir = tempdir().unwrap();
        assert!(collect(&dir.path().join("nope")).is_err());
        assert!(collect(dir.path()).is_err());
    }

    #[test]
    fn sizes_are_readable() {
        assert_eq!(format_size(12), "12 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
