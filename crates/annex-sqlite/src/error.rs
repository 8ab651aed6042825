//! Error types for the SQLite storage backend

use annex_core::StoreError;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, SqliteError>;

/// Errors that can occur during SQLite storage operations
#[derive(Debug, Error)]
pub enum SqliteError {
    /// Database connection or query error
    #[error("SQLite error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// IO error (for file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored or supplied data that cannot be used
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl SqliteError {
    /// Busy, locked or unopenable databases may recover on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            SqliteError::Database(e) => matches!(
                e.sqlite_error_code(),
                Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen)
            ),
            _ => false,
        }
    }
}

/// Convert SqliteError to StoreError for the storage trait
impl From<SqliteError> for StoreError {
    fn from(err: SqliteError) -> Self {
        if err.is_transient() {
            return StoreError::Unavailable(err.to_string());
        }
        match err {
            SqliteError::Database(e) => StoreError::Backend(format!("SQLite: {}", e)),
            SqliteError::Migration(msg) => StoreError::Backend(format!("Migration: {}", msg)),
            SqliteError::Io(e) => StoreError::Backend(format!("IO: {}", e)),
            SqliteError::InvalidData(msg) => StoreError::InvalidData(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    fn sqlite_failure(code: i32) -> SqliteError {
        SqliteError::Database(rusqlite::Error::SqliteFailure(ffi::Error::new(code), None))
    }

    #[test]
    fn busy_and_locked_are_unavailable() {
        for code in [ffi::SQLITE_BUSY, ffi::SQLITE_LOCKED, ffi::SQLITE_CANTOPEN] {
            let err: StoreError = sqlite_failure(code).into();
            assert!(matches!(err, StoreError::Unavailable(_)), "{:?}", err);
        }
    }

    #[test]
    fn constraint_failure_is_backend() {
        let err: StoreError = sqlite_failure(ffi::SQLITE_CONSTRAINT).into();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn invalid_data_passes_through() {
        let err: StoreError = SqliteError::InvalidData("bad blob".to_string()).into();
        match err {
            StoreError::InvalidData(msg) => assert_eq!(msg, "bad blob"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
