//! Error types for wikidb core.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// How a caller should react to a [`StorageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connectivity or contention. Safe to retry with backoff.
    Transient,
    /// Malformed input, constraint or mapping violation. Retrying won't help.
    Structural,
}

/// Errors raised by the wiki store.
///
/// Absence of a document is never an error: `load` returns `None`.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Journal backend failure.
    #[error("backend error: {0}")]
    Backend(#[from] wikidb_storage::BackendError),

    /// I/O error outside the journal (directory, lock file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The writer lock could not be acquired in time.
    #[error("contention: {message}")]
    Contention {
        /// What was being waited for.
        message: String,
    },

    /// Another process holds the store directory.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// Record encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] wikidb_codec::CodecError),

    /// The query clause could not be parsed or resolved.
    #[error("malformed query ({param_count} params) `{clause}`: {message}")]
    MalformedQuery {
        /// Clause text as submitted.
        clause: String,
        /// Number of positional parameters supplied.
        param_count: usize,
        /// What is wrong with it.
        message: String,
    },

    /// Placeholder count does not match the parameter list.
    #[error("query `{clause}` has {expected} placeholders but {actual} parameters were bound")]
    ParameterMismatch {
        /// Clause text as submitted.
        clause: String,
        /// Number of `?` placeholders in the clause.
        expected: usize,
        /// Number of parameters supplied.
        actual: usize,
    },

    /// A write would break a storage constraint.
    #[error("constraint violation on {identity}: {message}")]
    ConstraintViolation {
        /// Identity of the offending record.
        identity: String,
        /// Which constraint.
        message: String,
    },

    /// A custom mapping is invalid or does not match the data.
    #[error("mapping mismatch for class {class_name}: {message}")]
    MappingMismatch {
        /// Class the mapping belongs to.
        class_name: String,
        /// Description of the mismatch.
        message: String,
    },

    /// The journal is unreadable past its valid prefix.
    #[error("journal corruption: {message}")]
    JournalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why the operation is invalid.
        message: String,
    },

    /// The wiki is not in the catalogue.
    #[error("unknown wiki: {wiki}")]
    UnknownWiki {
        /// Wiki name.
        wiki: String,
    },
}

impl StorageError {
    /// Classifies the error for retry decisions.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Backend(_) | Self::Io(_) | Self::Contention { .. } | Self::StoreLocked => {
                ErrorKind::Transient
            }
            _ => ErrorKind::Structural,
        }
    }

    /// Returns `true` if the operation may succeed when retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Returns the clause text for query errors.
    #[must_use]
    pub fn clause(&self) -> Option<&str> {
        match self {
            Self::MalformedQuery { clause, .. } | Self::ParameterMismatch { clause, .. } => {
                Some(clause)
            }
            _ => None,
        }
    }

    /// Returns the number of parameters supplied for query errors.
    #[must_use]
    pub fn param_count(&self) -> Option<usize> {
        match self {
            Self::MalformedQuery { param_count, .. } => Some(*param_count),
            Self::ParameterMismatch { actual, .. } => Some(*actual),
            _ => None,
        }
    }

    /// Creates a contention error.
    pub fn contention(message: impl Into<String>) -> Self {
        Self::Contention {
            message: message.into(),
        }
    }

    /// Creates a malformed query error.
    pub fn malformed_query(
        clause: impl Into<String>,
        param_count: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedQuery {
            clause: clause.into(),
            param_count,
            message: message.into(),
        }
    }

    /// Creates a constraint violation error.
    pub fn constraint(identity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            identity: identity.into(),
            message: message.into(),
        }
    }

    /// Creates a mapping mismatch error.
    pub fn mapping_mismatch(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MappingMismatch {
            class_name: class_name.into(),
            message: message.into(),
        }
    }

    /// Creates a journal corruption error.
    pub fn journal_corruption(message: impl Into<String>) -> Self {
        Self::JournalCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contention_and_backend_are_transient() {
        assert!(StorageError::contention("writer busy").is_transient());
        let backend = wikidb_storage::BackendError::Unavailable("down".into());
        assert_eq!(StorageError::from(backend).kind(), ErrorKind::Transient);
        assert!(StorageError::StoreLocked.is_transient());
    }

    #[test]
    fn query_errors_are_structural_and_carry_context() {
        let err = StorageError::malformed_query("doc.name = = ?", 1, "unexpected `=`");
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert_eq!(err.clause(), Some("doc.name = = ?"));
        assert_eq!(err.param_count(), Some(1));

        let err = StorageError::ParameterMismatch {
            clause: "doc.name = ?".into(),
            expected: 1,
            actual: 0,
        };
        assert_eq!(err.param_count(), Some(0));
        assert!(!err.is_transient());
    }

    #[test]
    fn constraint_message_names_identity() {
        let err = StorageError::constraint("xwiki:Main.WebHome", "unknown wiki");
        assert_eq!(
            err.to_string(),
            "constraint violation on xwiki:Main.WebHome: unknown wiki"
        );
    }
}
