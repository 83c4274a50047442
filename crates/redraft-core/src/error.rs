//! Error types for redraft-core

use std::time::Duration;

use thiserror::Error;

use crate::models::DraftId;

/// Result type alias using redraft-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in redraft-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before any I/O happened
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Optimistic concurrency check failed
    #[error("Version conflict on draft {id}: expected version {expected}")]
    Conflict { id: DraftId, expected: u32 },

    /// Conflicts kept happening after every retry was spent
    #[error("Draft was modified elsewhere: {0}")]
    ModifiedElsewhere(String),

    /// Draft or version not found
    #[error("Draft not found: {0}")]
    NotFound(String),

    /// Network or backend hiccup worth retrying
    #[error("Transient I/O error: {0}")]
    Transient(String),

    /// Store call exceeded its deadline
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Lineage or row state that breaks a versioning invariant
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Local cache failure; logged, never surfaced by the session
    #[error("Cache error: {0}")]
    Cache(String),
}

/// Coarse classification used by the retry machine and by callers that only
/// care about the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Transient,
    Internal,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict { .. } | Self::ModifiedElsewhere(_) => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Transient(_) | Self::Timeout(_) => ErrorKind::Transient,
            Self::Sqlite(error) if is_busy(error) => ErrorKind::Transient,
            Self::Database(_)
            | Self::Sqlite(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Invariant(_)
            | Self::Cache(_) => ErrorKind::Internal,
        }
    }

    /// Whether a retry with backoff may succeed.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Whether this is a raw optimistic-concurrency rejection.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

fn is_busy(error: &rusqlite::Error) -> bool {
    matches!(
        error.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_taxonomy() {
        assert_eq!(Error::Validation("empty".into()).kind(), ErrorKind::Validation);
        assert_eq!(
            Error::Conflict {
                id: DraftId::new(),
                expected: 2
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(Error::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert!(Error::Timeout(Duration::from_secs(15)).is_transient());
        assert!(Error::Transient("reset".into()).is_transient());
        assert!(!Error::Database("broken".into()).is_transient());
    }

    #[test]
    fn busy_sqlite_is_transient() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(Error::Sqlite(busy).is_transient());
    }
}
