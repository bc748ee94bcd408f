//! Compact command implementation.

use super::inspect::format_size;
use std::path::Path;
use tracing::info;

/// Journal sizes around a compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactStats {
    /// Bytes before compaction.
    pub bytes_before: u64,
    /// Bytes after compaction.
    pub bytes_after: u64,
    /// Sequence captured by the snapshot.
    pub sequence: u64,
}

/// Checkpoints the store at `path`, or only measures it on a dry run.
pub fn compact(path: &Path, dry_run: bool) -> Result<CompactStats, Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;
    let before = store.stats()?;
    if dry_run {
        return Ok(CompactStats {
            bytes_before: before.journal_bytes,
            bytes_after: before.journal_bytes,
            sequence: before.committed_seq,
        });
    }
    let sequence = store.checkpoint()?;
    let after = store.stats()?;
    info!(
        sequence = sequence.as_u64(),
        before = before.journal_bytes,
        after = after.journal_bytes,
        "journal compacted"
    );
    Ok(CompactStats {
        bytes_before: before.journal_bytes,
        bytes_after: after.journal_bytes,
        sequence: sequence.as_u64(),
    })
}

/// Runs the compact command.
pub fn run(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("Compacting journal at {}", path.display());
    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();

    let stats = compact(path, dry_run)?;
    println!("  Sequence:    {}", stats.sequence);
    println!("  Size before: {}", format_size(stats.bytes_before));
    if !dry_run {
        println!("  Size after:  {}", format_size(stats.bytes_after));
        println!("✓ Compaction complete");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wikidb_core::{Document, DocumentReference, WikiStore};

    fn churned_store(dir: &Path) {
        let store = WikiStore::open(dir).unwrap();
        let ctx = store.context();
        let mut doc = Document::new(DocumentReference::new("xwiki", "Main", "A"));
        for i in 0..10 {
            doc.content = format!("revision {i} [[B]]");
            store.documents().save(&mut doc, &ctx).unwrap();
        }
    }

    #[test]
    fn compaction_shrinks_and_keeps_state() {
        let dir = tempdir().unwrap();
        churned_store(dir.path());

        let dry = compact(dir.path(), true).unwrap();
        assert_eq!(dry.bytes_before, dry.bytes_after);

        let stats = compact(dir.path(), false).unwrap();
        assert!(stats.bytes_after < stats.bytes_before);
        assert_eq!(stats.sequence, dry.sequence);

        let store = WikiStore::open(dir.path()).unwrap();
        let doc = store
            .documents()
            .load(&DocumentReference::new("xwiki", "Main", "A"), &store.context())
            .unwrap();
        assert_eq!(doc.revision, 10);
        assert_eq!(doc.content, "revision 9 [[B]]");
    }
}
