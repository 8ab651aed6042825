//! Storage error types

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Transient failure (busy, locked, unreachable). Safe to retry.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Storage backend error (database, filesystem, etc.)
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid record data
    #[error("invalid record data: {0}")]
    InvalidData(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
