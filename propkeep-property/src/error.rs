//! Error types for the property layer.

use propkeep_container::ContainerError;
use thiserror::Error;

/// Result type for property operations.
pub type PropertyResult<T> = Result<T, PropertyError>;

/// Errors reported by properties and the property manager.
///
/// Container failures never escape as panics; they reach the caller through
/// the error callback of the operation that hit them.
#[derive(Debug, Error)]
pub enum PropertyError {
    /// The container adapter failed.
    #[error("container error: {0}")]
    Container(#[from] ContainerError),

    /// A stored value could not be converted to or from the property's type.
    #[error("value conversion error: {0}")]
    Conversion(#[from] propkeep_types::Error),

    /// No container is attached for the owner.
    #[error("no container attached for owner {0}")]
    UnknownOwner(String),

    /// The key is already registered for the owner with a different type.
    #[error("property {key} is registered as {existing}, requested {requested}")]
    TypeConflict {
        key: String,
        existing: &'static str,
        requested: &'static str,
    },

    /// A background write panicked or was dropped before it ran.
    #[error("background write aborted: {0}")]
    WriteAborted(String),

    /// The background executor cannot accept work.
    #[error("executor unavailable: {0}")]
    ExecutorUnavailable(String),

    /// Pending writes did not finish in time.
    #[error("timed out after {timeout_ms}ms with {pending} writes still pending")]
    DrainTimeout { timeout_ms: u64, pending: usize },

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}
