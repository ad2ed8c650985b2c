//! Repository errors
//!
//! Callers need to tell bad input apart from an unavailable store, so the
//! two never share a variant.

use thiserror::Error;

use crate::storage::StorageError;

/// Input rejected before any store access
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("A link needs at least one non-blank tag")]
    EmptyTags,

    #[error("Tag '{0}' contains the reserved '|' delimiter")]
    TagContainsDelimiter(String),

    #[error("Username must not be empty")]
    EmptyUsername,
}

/// Errors returned by the repositories
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Invalid backup: {0}")]
    Backup(String),
}

impl Error {
    /// The caller sent something unusable ("bad input")
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// The store failed ("service unavailable")
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_and_storage_are_distinct() {
        let validation: Error = ValidationError::EmptyTags.into();
        let storage: Error = StorageError::ConnectionPoisoned.into();

        assert!(validation.is_validation());
        assert!(!validation.is_storage());
        assert!(storage.is_storage());
        assert!(!storage.is_validation());
    }

    #[test]
    fn test_error_display() {
        let err: Error = ValidationError::TagContainsDelimiter("a|b".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Invalid input: Tag 'a|b' contains the reserved '|' delimiter"
        );

        let err = Error::NotFound {
            kind: "Link",
            id: "abc".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Link not found: abc");
    }
}
