//! Container adapter boundary for propkeep.
//!
//! A container is an opaque key-value store addressed by [`NamespacedKey`]
//! that stores [`Value`]s under a declared [`ValueType`] and reports absence
//! distinctly from presence. The property layer only talks to containers
//! through the [`Container`] trait; hosts provide their own implementation.
//!
//! Two reference containers are included:
//!
//! - [`MemoryContainer`] keeps values in process memory
//! - [`SqliteContainer`] persists values in a SQLite file
//!
//! Neither retries failed operations. Retry policy, if any, belongs to the
//! container implementation.

mod error;
mod memory;
mod sqlite;

pub use error::{ContainerError, ContainerResult};
pub use memory::MemoryContainer;
pub use sqlite::SqliteContainer;

use propkeep_types::{NamespacedKey, Value, ValueType};
use std::sync::Arc;

/// A typed key-value store owned by the host.
///
/// Every method may fail with an adapter-defined error. Implementations must
/// be safe to call from any thread; callers serialize access themselves.
pub trait Container: Send + Sync {
    /// Reads the value stored under `key`, or `None` if nothing is stored.
    ///
    /// A stored value that does not match `ty` is a
    /// [`ContainerError::TypeMismatch`], not an absence.
    fn try_get(&self, key: &NamespacedKey, ty: &ValueType) -> ContainerResult<Option<Value>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &NamespacedKey, ty: &ValueType, value: Value) -> ContainerResult<()>;

    /// Deletes the value under `key`. Deleting an absent key is not an error.
    fn remove(&self, key: &NamespacedKey) -> ContainerResult<()>;

    /// Lists every key currently stored, in no particular order.
    fn keys(&self) -> ContainerResult<Vec<NamespacedKey>>;
}

impl<C: Container + ?Sized> Container for Arc<C> {
    fn try_get(&self, key: &NamespacedKey, ty: &ValueType) -> ContainerResult<Option<Value>> {
        (**self).try_get(key, ty)
    }

    fn set(&self, key: &NamespacedKey, ty: &ValueType, value: Value) -> ContainerResult<()> {
        (**self).set(key, ty, value)
    }

    fn remove(&self, key: &NamespacedKey) -> ContainerResult<()> {
        (**self).remove(key)
    }

    fn keys(&self) -> ContainerResult<Vec<NamespacedKey>> {
        (**self).keys()
    }
}

/// Rejects `value` unless it can be stored under `ty`.
pub(crate) fn check_type(key: &NamespacedKey, ty: &ValueType, value: &Value) -> ContainerResult<()> {
    if value.matches(ty) {
        Ok(())
    } else {
        Err(ContainerError::TypeMismatch {
            key: key.to_string(),
            expected: ty.clone(),
            found: value.type_name().to_string(),
        })
    }
}
