//! Error types for storage operations

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error (file access, directory listing, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded
    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record exists but cannot be decoded
    #[error("corrupt record {record}: {reason}")]
    Corrupted { record: String, reason: String },

    /// No readable record exists
    #[error("no readable snapshot record found")]
    NotFound,
}
