//! Error types for the container layer.

use propkeep_types::ValueType;
use thiserror::Error;

/// Result type for container operations.
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Errors that can occur in container operations.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Backend-specific failure (I/O, host API error, poisoned state).
    #[error("container backend error: {0}")]
    Backend(String),

    /// The stored or supplied value does not have the declared type.
    #[error("type mismatch for {key}: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: ValueType,
        found: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored row could not be turned back into a key or value.
    #[error("invalid data: {0}")]
    Types(#[from] propkeep_types::Error),
}
