//! Error types for JsonDB core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in JsonDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] jsondb_codec::CodecError),

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] jsondb_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No document with the requested identifier.
    #[error("document {id} not found in collection {collection}")]
    NotFound {
        /// Collection searched.
        collection: String,
        /// Identifier that was not found.
        id: String,
    },

    /// A filter specification is malformed.
    #[error("invalid filter: {message}")]
    InvalidFilter {
        /// What is wrong with the filter.
        message: String,
    },

    /// A sort specification is malformed.
    #[error("invalid sort: {message}")]
    InvalidSort {
        /// What is wrong with the sort.
        message: String,
    },

    /// A modify callback asked for a rollback.
    #[error("modification rolled back by callback")]
    CallbackAbort,

    /// A modify callback returned a contradictory outcome.
    #[error("invalid modify outcome: {message}")]
    InvalidOutcome {
        /// Why the outcome was rejected.
        message: String,
    },

    /// A write collided with an existing identifier or tried to change one.
    #[error("write conflict on {id} in collection {collection}: {message}")]
    WriteConflict {
        /// Collection written to.
        collection: String,
        /// Identifier involved.
        id: String,
        /// What collided.
        message: String,
    },

    /// A document carries an unusable identifier.
    #[error("invalid identifier: {message}")]
    InvalidIdentifier {
        /// Why the identifier was rejected.
        message: String,
    },

    /// WAL is corrupted or invalid.
    #[error("WAL corruption: {message}")]
    WalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// Invalid database format or version.
    #[error("invalid database format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Database is already open or locked.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// Database is closed.
    #[error("database is closed")]
    DatabaseClosed,

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a not-found error.
    pub fn not_found(collection: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.to_string(),
        }
    }

    /// Creates an invalid filter error.
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilter {
            message: message.into(),
        }
    }

    /// Creates an invalid sort error.
    pub fn invalid_sort(message: impl Into<String>) -> Self {
        Self::InvalidSort {
            message: message.into(),
        }
    }

    /// Creates an invalid outcome error.
    pub fn invalid_outcome(message: impl Into<String>) -> Self {
        Self::InvalidOutcome {
            message: message.into(),
        }
    }

    /// Creates a write conflict error.
    pub fn write_conflict(
        collection: impl Into<String>,
        id: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Self::WriteConflict {
            collection: collection.into(),
            id: id.to_string(),
            message: message.into(),
        }
    }

    /// Creates an invalid identifier error.
    pub fn invalid_identifier(message: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            message: message.into(),
        }
    }

    /// Creates a WAL corruption error.
    pub fn wal_corruption(message: impl Into<String>) -> Self {
        Self::WalCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for errors caused by a malformed filter or sort.
    #[must_use]
    pub fn is_specification_error(&self) -> bool {
        matches!(self, Self::InvalidFilter { .. } | Self::InvalidSort { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_errors_convert_to_serialization() {
        let err: CoreError = jsondb_codec::CodecError::UnexpectedEof.into();
        assert!(matches!(err, CoreError::Serialization(_)));
        assert_eq!(
            err.to_string(),
            "serialization error: unexpected end of input"
        );
    }

    #[test]
    fn messages_name_the_document() {
        let err = CoreError::write_conflict("players", "42", "identifier changed");
        assert_eq!(
            err.to_string(),
            "write conflict on 42 in collection players: identifier changed"
        );
        assert_eq!(
            CoreError::not_found("players", 7).to_string(),
            "document 7 not found in collection players"
        );
    }

    #[test]
    fn specification_errors() {
        assert!(CoreError::invalid_filter("x").is_specification_error());
        assert!(CoreError::invalid_sort("x").is_specification_error());
        assert!(!CoreError::CallbackAbort.is_specification_error());
    }
}
