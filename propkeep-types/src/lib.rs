//! Core type definitions for propkeep.
//!
//! This crate defines the plugin-agnostic vocabulary shared by the container
//! adapters and the property layer:
//! - Owner identifiers (UUID v7)
//! - Namespaced keys addressing a value inside a container
//! - Declared type tags and the tagged values containers store
//! - The [`PropertyType`] mapping between Rust types and stored values

mod ids;
mod key;
mod value;

pub use ids::OwnerId;
pub use key::NamespacedKey;
pub use value::{Json, PropertyType, Value, ValueType};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: ValueType, found: String },
}
