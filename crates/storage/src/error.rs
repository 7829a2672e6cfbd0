use std::path::Path;

use rusqlite::ErrorCode;

/// All errors that can be returned by [`RecordStore`](crate::RecordStore)
/// and [`ShadowStore`](crate::ShadowStore).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The mirror was used before `create_if_absent` and no mirror file
    /// exists on disk yet.
    #[error("Local database does not exist. Call create_local_db first.")]
    NotInitialized,

    /// A malformed write request (empty table or fields, unknown column).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A uniqueness constraint rejected the write.
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// The statement itself failed (syntax error, unknown table, ...).
    /// Surfaced verbatim.
    #[error("{0}")]
    Query(String),

    /// A stored row could not be decoded into its record type.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// The database file cannot be used at all (cannot open, disk full,
    /// read-only, permission denied, I/O failure). Fatal for the call.
    #[error("fatal: storage unavailable at {path}: {message}")]
    Unavailable { path: String, message: String },
}

impl StorageError {
    /// Classify a SQLite error for the database at `path`.
    pub(crate) fn from_sqlite(path: &Path, err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::CannotOpen
                | ErrorCode::DiskFull
                | ErrorCode::ReadOnly
                | ErrorCode::PermissionDenied
                | ErrorCode::SystemIoFailure
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt => StorageError::Unavailable {
                    path: path.display().to_string(),
                    message: err.to_string(),
                },
                ErrorCode::ConstraintViolation => StorageError::Duplicate(err.to_string()),
                _ => StorageError::Query(err.to_string()),
            },
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::IntegralValueOutOfRange(..) => {
                StorageError::Corrupt(err.to_string())
            }
            _ => StorageError::Query(err.to_string()),
        }
    }

    pub(crate) fn poisoned(path: &Path) -> Self {
        StorageError::Unavailable {
            path: path.display().to_string(),
            message: "connection lock poisoned by a panicked writer".to_string(),
        }
    }

    /// True for the fatal class that should abort the call outright.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StorageError::Unavailable { .. })
    }
}
