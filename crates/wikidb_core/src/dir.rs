//! Store directory management.
//!
//! ```text
//! <store_path>/
//! ├─ LOCK              # Advisory lock, one process at a time
//! ├─ journal.log       # Append-only commit journal
//! └─ journal.log.tmp   # Only present during a checkpoint
//! ```

use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const JOURNAL_FILE: &str = "journal.log";
const JOURNAL_TEMP: &str = "journal.log.tmp";

/// An opened store directory.
///
/// Holds an exclusive advisory lock on `LOCK` for as long as it lives, so a
/// second process opening the same directory gets
/// [`StorageError::StoreLocked`].
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - The path is not a directory
    /// - Another process holds the lock (`StoreLocked`)
    pub fn open(path: &Path, create_if_missing: bool) -> StorageResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StorageError::invalid_operation(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(StorageError::invalid_operation(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::StoreLocked);
        }

        // Leftover from a checkpoint that never reached its rename.
        let temp = path.join(JOURNAL_TEMP);
        if temp.exists() {
            fs::remove_file(&temp)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the journal file.
    #[must_use]
    pub fn journal_path(&self) -> PathBuf {
        self.path.join(JOURNAL_FILE)
    }

    /// Path a checkpoint writes to before renaming over the journal.
    #[must_use]
    pub fn journal_temp_path(&self) -> PathBuf {
        self.path.join(JOURNAL_TEMP)
    }
}
