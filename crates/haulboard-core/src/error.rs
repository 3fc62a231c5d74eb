//! Error types for haulboard-core

use thiserror::Error;

use crate::validation::ValidationReport;

/// Result type alias using haulboard-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in haulboard-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed date or time string
    #[error("Format error: {0}")]
    Format(String),

    /// Business-rule violation on a proposed placement
    #[error("Validation failed: {}", .0.summary())]
    Validation(ValidationReport),

    /// Persistence collaborator rejected the write or the transport failed
    #[error("Commit failed: {0}")]
    Commit(#[from] CommitError),

    /// Schedule not found
    #[error("Schedule not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not allowed in the current controller state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// `SQLite` error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure reported by the persistence collaborator.
///
/// Every variant is retryable from the user's point of view; the core maps
/// them to a rollback of the optimistic mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitError {
    /// Network or storage transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The store rejected the row (constraint, permission, stale write)
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The row no longer exists in the store
    #[error("schedule {0} no longer exists")]
    NotFound(String),
}

impl Error {
    /// Whether the user can reasonably retry the action that produced this error.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Commit(_) | Self::Database(_) | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_errors_are_retryable() {
        let error = Error::from(CommitError::Transport("connection reset".to_string()));
        assert!(error.is_retryable());
        assert_eq!(
            error.to_string(),
            "Commit failed: transport error: connection reset"
        );
    }

    #[test]
    fn format_errors_are_not_retryable() {
        assert!(!Error::Format("25:61".to_string()).is_retryable());
    }
}
