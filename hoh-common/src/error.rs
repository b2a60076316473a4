//! Common error types for the honor ledger

use thiserror::Error;
use uuid::Uuid;

/// Common result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which side of a record an award conflict was detected on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// A student is already awarded under the same category/sub-award key
    Student,
    /// A class is already awarded under the same category/sub-award key
    Class,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::Student => write!(f, "student"),
            ConflictKind::Class => write!(f, "class"),
        }
    }
}

/// Common error types across the honor ledger
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error) - transient, retryable by the caller
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or malformed required field, rejected before any store access
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A student or class is already awarded under the same sub-award key
    #[error("Duplicate {kind} award for sub-award '{label}'")]
    Duplicate {
        kind: ConflictKind,
        label: String,
        school_year: Option<Uuid>,
    },

    /// Cascade or batch transaction aborted mid-flight; nothing was committed
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for infrastructure failures a caller may retry with backoff.
    /// Duplicate/validation failures are not transient and must not be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_error_display() {
        let err = Error::Duplicate {
            kind: ConflictKind::Student,
            label: "March Star".to_string(),
            school_year: None,
        };
        assert_eq!(err.to_string(), "Duplicate student award for sub-award 'March Star'");
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::Database(sqlx::Error::PoolClosed).is_transient());
        assert!(!Error::Validation("missing sub-award type".to_string()).is_transient());
        assert!(!Error::Duplicate {
            kind: ConflictKind::Class,
            label: "Best Class".to_string(),
            school_year: None,
        }
        .is_transient());
    }
}
