//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding or decoding documents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A value could not be encoded.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Bytes could not be decoded.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// NaN and infinities have no document representation.
    #[error("non-finite numbers cannot be stored")]
    NonFiniteNumber,

    /// Indefinite-length items are not produced by the encoder.
    #[error("indefinite-length items are forbidden")]
    IndefiniteLengthForbidden,

    /// A text item held invalid UTF-8.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Input ended inside an item.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Structurally invalid input.
    #[error("invalid document structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },

    /// An item type with no document counterpart.
    #[error("unsupported item type: {type_name}")]
    UnsupportedType {
        /// Name of the unsupported type.
        type_name: String,
    },

    /// A length prefix exceeded the decoder's limits.
    #[error("size limit exceeded: claimed {claimed}, max allowed {max_allowed}")]
    SizeLimitExceeded {
        /// Claimed length.
        claimed: u64,
        /// Allowed maximum.
        max_allowed: u64,
    },

    /// An object carried the same key twice.
    #[error("duplicate object key: {key}")]
    DuplicateKey {
        /// The repeated key.
        key: String,
    },

    /// Bytes remained after the top-level item.
    #[error("{count} trailing bytes after document")]
    TrailingBytes {
        /// Number of unread bytes.
        count: usize,
    },

    /// JSON text could not be parsed or produced.
    #[error("JSON error: {message}")]
    Json {
        /// Message from the JSON layer.
        message: String,
    },
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }

    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Create an unsupported type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}
