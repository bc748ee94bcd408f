//! Journal records and their on-disk framing.
//!
//! ```text
//! +-------+---------+-------------------+--------+
//! | magic | len u32 | payload (CBOR)    | crc32  |
//! | 4     | 4 (LE)  | len bytes         | 4 (LE) |
//! +-------+---------+-------------------+--------+
//! ```
//!
//! The CRC covers magic, length and payload.

use crate::error::{StorageError, StorageResult};
use crate::tables::{Mutation, Tables};
use crate::types::{SequenceNumber, TransactionId};
use serde::{Deserialize, Serialize};

/// Frame magic.
pub const JOURNAL_MAGIC: [u8; 4] = *b"WKJ1";

/// Bytes before the payload.
pub const HEADER_SIZE: usize = 8;

/// Bytes after the payload.
pub const CRC_SIZE: usize = 4;

/// A decoded journal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalRecord {
    /// Mutations of one committed transaction.
    Commit {
        /// Transaction that produced the batch.
        txid: TransactionId,
        /// Commit sequence.
        sequence: SequenceNumber,
        /// Mutations in application order.
        mutations: Vec<Mutation>,
    },
    /// Full table state; replay restarts from here.
    Snapshot {
        /// Sequence of the last commit folded into the snapshot.
        sequence: SequenceNumber,
        /// The tables.
        tables: Tables,
    },
}

impl JournalRecord {
    /// Sequence number carried by the record.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        match self {
            Self::Commit { sequence, .. } | Self::Snapshot { sequence, .. } => *sequence,
        }
    }
}

/// Borrowing twin of [`JournalRecord`] used on the write path.
///
/// Serializes to exactly the same bytes, without cloning the batch or the
/// snapshot.
#[derive(Debug, Serialize)]
pub enum JournalRecordRef<'a> {
    /// See [`JournalRecord::Commit`].
    Commit {
        /// Transaction that produced the batch.
        txid: TransactionId,
        /// Commit sequence.
        sequence: SequenceNumber,
        /// Mutations in application order.
        mutations: &'a [Mutation],
    },
    /// See [`JournalRecord::Snapshot`].
    Snapshot {
        /// Sequence of the last commit folded into the snapshot.
        sequence: SequenceNumber,
        /// The tables.
        tables: &'a Tables,
    },
}

/// Wraps an encoded payload in a frame.
///
/// # Errors
///
/// Returns an error if the payload does not fit a `u32` length.
pub fn encode_frame(payload: &[u8]) -> StorageResult<Vec<u8>> {
    let len = u32::try_from(payload.len())
        .map_err(|_| StorageError::invalid_operation("journal record larger than 4 GiB"))?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    frame.extend_from_slice(&JOURNAL_MAGIC);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(payload);
    let crc = crc32(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

/// Parses a frame header, returning the payload length.
///
/// # Errors
///
/// Returns journal corruption if the magic is wrong.
pub fn decode_header(header: &[u8]) -> StorageResult<usize> {
    if header.len() < HEADER_SIZE || header[..4] != JOURNAL_MAGIC {
        return Err(StorageError::journal_corruption("bad frame magic"));
    }
    let mut len = [0u8; 4];
    len.copy_from_slice(&header[4..8]);
    Ok(u32::from_le_bytes(len) as usize)
}

/// Verifies the trailing CRC of a complete frame and returns its payload.
///
/// # Errors
///
/// Returns journal corruption on a checksum mismatch.
pub fn verify_frame(frame: &[u8]) -> StorageResult<&[u8]> {
    if frame.len() < HEADER_SIZE + CRC_SIZE {
        return Err(StorageError::journal_corruption("frame shorter than its envelope"));
    }
    let (body, tail) = frame.split_at(frame.len() - CRC_SIZE);
    let mut stored = [0u8; 4];
    stored.copy_from_slice(tail);
    let expected = u32::from_le_bytes(stored);
    let actual = crc32(body);
    if expected != actual {
        return Err(StorageError::journal_corruption(format!(
            "checksum mismatch: expected {expected:08x}, got {actual:08x}"
        )));
    }
    Ok(&body[HEADER_SIZE..])
}

/// CRC-32 (IEEE, reflected).
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}
