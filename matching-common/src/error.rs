//! Common error types for the matching services

use thiserror::Error;

/// Common result type for matching operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the matching services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
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

    /// Rejected write; names the offending field
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Caller tried to act on a resource owned by another user
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Uniqueness or state conflict; safe for the caller to retry or re-read
    #[error("Conflict: {0}")]
    Conflict(String),

    /// JSON encode/decode error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a validation error for `field`
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Translate SQLite unique-constraint failures into `Conflict`
    ///
    /// The storage layer's uniqueness constraint is authoritative; callers
    /// see a retryable conflict instead of an opaque database error.
    pub fn from_write(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Error::Conflict(format!("{} already exists", what));
            }
        }
        Error::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = Error::validation("name", "tag name already exists");
        assert_eq!(err.to_string(), "Invalid name: tag name already exists");
    }

    #[test]
    fn test_from_write_passes_through_non_constraint_errors() {
        let err = Error::from_write(sqlx::Error::RowNotFound, "match");
        assert!(matches!(err, Error::Database(sqlx::Error::RowNotFound)));
    }
}
