//! Storage error handling
//!
//! Provides typed errors for key-value store operations with descriptive
//! messages and recovery suggestions.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while talking to the key-value store
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create the directory holding the database file
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// SQLite database error (connection, constraint, busy, ...)
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A watched field changed between the read and the batch
    #[error("Watched key '{key}' was modified concurrently; batch discarded")]
    WatchConflict { key: String },

    /// A command produced a reply of a different shape than the caller expected
    #[error("Unexpected reply to {command}: expected {expected}")]
    UnexpectedReply {
        command: &'static str,
        expected: &'static str,
    },

    /// A command was rejected before touching the database
    #[error("Invalid {command} command: {details}")]
    InvalidCommand {
        command: &'static str,
        details: String,
    },

    /// A stored record could not be decoded
    #[error("Record at '{key}' is corrupted: {details}")]
    CorruptRecord { key: String, details: String },

    /// A thread panicked while holding the connection
    #[error("Store connection is poisoned by a panicked writer")]
    ConnectionPoisoned,
}

impl StorageError {
    /// Check if this error is recoverable by the caller
    ///
    /// A busy database or a lost watch race can succeed on a later attempt;
    /// the repositories themselves never retry.
    pub fn is_recoverable(&self) -> bool {
        match self {
            StorageError::WatchConflict { .. } => true,
            StorageError::Database(e) => is_busy(e),
            _ => false,
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::WatchConflict { .. } => {
                Some("Another writer changed the record. Reload it and try again.")
            }
            StorageError::Database(e) if is_busy(e) => {
                Some("The database is locked by another process. Try again shortly or raise busy_timeout_ms.")
            }
            StorageError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            StorageError::CorruptRecord { .. } => {
                Some("Delete the record or restore it from a backup.")
            }
            _ => None,
        }
    }
}

fn is_busy(error: &rusqlite::Error) -> bool {
    matches!(
        error.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
    )
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_conflict_is_recoverable() {
        let err = StorageError::WatchConflict {
            key: "link:abc".to_string(),
        };

        assert!(err.is_recoverable());
        assert!(err.recovery_suggestion().is_some());
        assert!(err.to_string().contains("link:abc"));
    }

    #[test]
    fn test_busy_database_is_recoverable() {
        let err = StorageError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ));

        assert!(err.is_recoverable());
    }

    #[test]
    fn test_corrupt_record_not_recoverable() {
        let err = StorageError::CorruptRecord {
            key: "link:abc".to_string(),
            details: "missing field 'url_address'".to_string(),
        };

        assert!(!err.is_recoverable());
        let msg = err.to_string();
        assert!(msg.contains("corrupted"));
        assert!(msg.contains("url_address"));
    }

    #[test]
    fn test_unexpected_reply_display() {
        let err = StorageError::UnexpectedReply {
            command: "ZCARD",
            expected: "integer",
        };

        assert_eq!(err.to_string(), "Unexpected reply to ZCARD: expected integer");
    }
}
