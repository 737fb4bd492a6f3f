use strata_types::ObjectId;

/// Errors from storage provider operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested key was not found.
    #[error("key not found: {0}")]
    NotFound(String),

    /// The key cannot be mapped onto the backend (empty, absolute, `..`).
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Stored sample bytes do not hash to the id they were read under.
    #[error("hash mismatch for {id}: computed {computed}")]
    HashMismatch { id: ObjectId, computed: ObjectId },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A sample payload failed to encode or decode.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from sample encoding and decoding.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// The payload failed an integrity check.
    #[error("corrupt sample payload: {reason}")]
    Corrupt { reason: String },

    /// Compression itself failed.
    #[error("compression failed: {0}")]
    Compress(String),
}

impl CodecError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt {
            reason: reason.into(),
        }
    }
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
