//! Append-only journal of committed transactions.
//!
//! Every commit appends exactly one frame. On open the frames are
//! replayed in order to rebuild the tables; a snapshot frame written by a
//! checkpoint replaces everything before it.

mod record;

pub use record::{JournalRecord, JournalRecordRef};

use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use record::{decode_header, encode_frame, verify_frame, CRC_SIZE, HEADER_SIZE, JOURNAL_MAGIC};
use tracing::{debug, warn};
use wikidb_storage::StorageBackend;

/// Writes and replays journal frames over a [`StorageBackend`].
pub struct Journal {
    backend: Mutex<Box<dyn StorageBackend>>,
    sync_on_commit: bool,
}

impl Journal {
    /// Creates a journal over `backend`.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_commit,
        }
    }

    /// Appends one record as a single frame.
    ///
    /// Returns the frame offset. Nothing is considered written unless
    /// this returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the record cannot be encoded, or the
    /// backend error if the append or flush fails.
    pub fn append(&self, record: &JournalRecordRef<'_>) -> StorageResult<u64> {
        let frame = encode_frame(&wikidb_codec::to_cbor(record)?)?;
        let mut backend = self.backend.lock();
        let before = backend.size()?;
        let offset = match backend.append(&frame) {
            Ok(offset) => offset,
            Err(err) => {
                // A partial frame would hide every later commit from replay.
                let _ = backend.truncate(before);
                return Err(err.into());
            }
        };
        if self.sync_on_commit {
            if let Err(err) = backend.flush() {
                // Roll the frame back so replay never resurrects it.
                let _ = backend.truncate(offset);
                return Err(err.into());
            }
        }
        Ok(offset)
    }

    /// Reads every intact record from the start of the journal.
    ///
    /// A bad frame with nothing intact after it is the trace of a crash
    /// mid-append: it is cut off and replay stops there. A bad frame
    /// followed by an intact one is damage to committed history and is
    /// reported instead; the journal is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the journal cannot be read, or journal
    /// corruption if a frame before the tail is damaged.
    pub fn replay(&self) -> StorageResult<Vec<JournalRecord>> {
        let mut backend = self.backend.lock();
        let size = backend.size()?;
        let mut offset = 0u64;
        let mut records = Vec::new();

        while offset < size {
            match Self::read_frame(backend.as_ref(), offset, size) {
                Ok((record, next)) => {
                    records.push(record);
                    offset = next;
                }
                Err(err) => {
                    if let Some(intact) = Self::next_intact_frame(backend.as_ref(), offset, size)? {
                        return Err(StorageError::journal_corruption(format!(
                            "damaged frame at offset {offset} precedes an intact frame at offset {intact}: {err}"
                        )));
                    }
                    warn!(
                        offset,
                        discarded = size - offset,
                        error = %err,
                        "truncating incomplete journal tail"
                    );
                    backend.truncate(offset)?;
                    break;
                }
            }
        }

        debug!(records = records.len(), bytes = offset, "journal replayed");
        Ok(records)
    }

    /// Offset of the first decodable frame after a bad one at `offset`.
    fn next_intact_frame(
        backend: &dyn StorageBackend,
        offset: u64,
        size: u64,
    ) -> StorageResult<Option<u64>> {
        let rest = backend.read_at(offset, (size - offset) as usize)?;
        let candidates = rest
            .windows(JOURNAL_MAGIC.len())
            .enumerate()
            .skip(1)
            .filter(|(_, window)| **window == JOURNAL_MAGIC[..])
            .map(|(pos, _)| offset + pos as u64);
        for candidate in candidates {
            if Self::read_frame(backend, candidate, size).is_ok() {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    fn read_frame(
        backend: &dyn StorageBackend,
        offset: u64,
        size: u64,
    ) -> StorageResult<(JournalRecord, u64)> {
        if offset + (HEADER_SIZE as u64) > size {
            return Err(StorageError::journal_corruption("truncated frame header"));
        }
        let header = backend.read_at(offset, HEADER_SIZE)?;
        let len = decode_header(&header)?;
        let frame_len = (HEADER_SIZE + len + CRC_SIZE) as u64;
        if offset + frame_len > size {
            return Err(StorageError::journal_corruption("truncated frame body"));
        }
        let frame = backend.read_at(offset, frame_len as usize)?;
        let payload = verify_frame(&frame)?;
        let record = wikidb_codec::from_cbor(payload)?;
        Ok((record, offset + frame_len))
    }

    /// Replaces the journal contents with a single record, in place.
    ///
    /// # Errors
    ///
    /// Returns the backend error if truncation or the write fails.
    pub fn rewrite(&self, record: &JournalRecordRef<'_>) -> StorageResult<()> {
        let frame = encode_frame(&wikidb_codec::to_cbor(record)?)?;
        let mut backend = self.backend.lock();
        backend.truncate(0)?;
        backend.append(&frame)?;
        backend.sync()?;
        Ok(())
    }

    /// Writes `record` into a fresh backend, then switches to it.
    ///
    /// The caller makes `fresh` durable under the journal's name (for
    /// files: rename) inside `install`, which runs before the swap.
    ///
    /// # Errors
    ///
    /// Returns the first error from writing, syncing or `install`; the
    /// current backend stays in place on failure.
    pub fn replace_with<F>(
        &self,
        mut fresh: Box<dyn StorageBackend>,
        record: &JournalRecordRef<'_>,
        install: F,
    ) -> StorageResult<()>
    where
        F: FnOnce() -> StorageResult<()>,
    {
        let frame = encode_frame(&wikidb_codec::to_cbor(record)?)?;
        fresh.append(&frame)?;
        fresh.sync()?;

        let mut backend = self.backend.lock();
        install()?;
        *backend = fresh;
        Ok(())
    }

    /// Current journal size in bytes.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the size is unavailable.
    pub fn size(&self) -> StorageResult<u64> {
        Ok(self.backend.lock().size()?)
    }
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("sync_on_commit", &self.sync_on_commit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{Mutation, Tables};
    use crate::types::{SequenceNumber, TransactionId};
    use wikidb_storage::InMemoryBackend;

    fn commit(seq: u64, wiki: &str) -> (TransactionId, SequenceNumber, Vec<Mutation>) {
        (
            TransactionId::new(seq),
            SequenceNumber::new(seq),
            vec![Mutation::CreateWiki(wiki.into())],
        )
    }

    fn append_commit(journal: &Journal, seq: u64, wiki: &str) {
        let (txid, sequence, mutations) = commit(seq, wiki);
        journal
            .append(&JournalRecordRef::Commit {
                txid,
                sequence,
                mutations: &mutations,
            })
            .unwrap();
    }

    #[test]
    fn replay_returns_records_in_order() {
        let backend = InMemoryBackend::new();
        let journal = Journal::new(Box::new(backend.clone()), true);
        append_commit(&journal, 1, "a");
        append_commit(&journal, 2, "b");

        let reopened = Journal::new(Box::new(backend), true);
        let records = reopened.replay().unwrap();
        let sequences: Vec<_> = records.iter().map(|r| r.sequence().as_u64()).collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[test]
    fn torn_tail_is_truncated() {
        let backend = InMemoryBackend::new();
        let journal = Journal::new(Box::new(backend.clone()), true);
        append_commit(&journal, 1, "a");
        let intact = backend.data().len();
        append_commit(&journal, 2, "b");

        // Simulate a crash halfway through the second frame.
        let mut bytes = backend.data();
        bytes.truncate(intact + 5);
        let torn = InMemoryBackend::with_data(bytes);

        let journal = Journal::new(Box::new(torn.clone()), true);
        assert_eq!(journal.replay().unwrap().len(), 1);
        assert_eq!(torn.data().len(), intact);
    }

    #[test]
    fn damaged_middle_frame_is_reported_not_truncated() {
        let backend = InMemoryBackend::new();
        let journal = Journal::new(Box::new(backend.clone()), true);
        append_commit(&journal, 1, "a");
        let second = backend.data().len();
        append_commit(&journal, 2, "b");
        append_commit(&journal, 3, "c");

        let mut bytes = backend.data();
        bytes[second + HEADER_SIZE] ^= 0xFF;
        let damaged = InMemoryBackend::with_data(bytes.clone());

        let err = Journal::new(Box::new(damaged.clone()), true)
            .replay()
            .unwrap_err();
        assert!(matches!(err, StorageError::JournalCorruption { .. }));
        assert!(!err.is_transient());
        assert_eq!(damaged.data(), bytes);
    }

    #[test]
    fn damaged_last_frame_is_truncated() {
        let backend = InMemoryBackend::new();
        let journal = Journal::new(Box::new(backend.clone()), true);
        append_commit(&journal, 1, "a");
        let intact = backend.data().len();
        append_commit(&journal, 2, "b");

        let mut bytes = backend.data();
        bytes[intact + HEADER_SIZE] ^= 0xFF;
        let damaged = InMemoryBackend::with_data(bytes);

        let journal = Journal::new(Box::new(damaged.clone()), true);
        assert_eq!(journal.replay().unwrap().len(), 1);
        assert_eq!(damaged.data().len(), intact);
    }

    #[test]
    fn rewrite_leaves_a_single_snapshot() {
        let backend = InMemoryBackend::new();
        let journal = Journal::new(Box::new(backend.clone()), true);
        append_commit(&journal, 1, "a");
        append_commit(&journal, 2, "b");

        let tables = Tables::default();
        journal
            .rewrite(&JournalRecordRef::Snapshot {
                sequence: SequenceNumber::new(2),
                tables: &tables,
            })
            .unwrap();

        let records = Journal::new(Box::new(backend), true).replay().unwrap();
        assert_eq!(records.len(), 1);
        assert!(matches!(records[0], JournalRecord::Snapshot { .. }));
    }
}
