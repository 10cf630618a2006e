use std::path::PathBuf;

/// Errors from key-value persistence.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The backing document exists but is not a JSON object.
    #[error("corrupt store file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// An internal lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// A blocking persistence task failed to complete.
    #[error("background write failed: {0}")]
    Task(String),

    /// The backend refused the write (used by read-only and fault-injecting stores).
    #[error("write rejected: {0}")]
    Rejected(String),
}

impl From<serde_json::Error> for KvError {
    fn from(e: serde_json::Error) -> Self {
        KvError::Serialization(e.to_string())
    }
}

/// Result alias for key-value operations.
pub type KvResult<T> = Result<T, KvError>;
