//! In-process container.

use crate::{check_type, Container, ContainerError, ContainerResult};
use propkeep_types::{NamespacedKey, Value, ValueType};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// A container that keeps values in a `HashMap`.
///
/// Values live as long as the container does. Useful for hosts without a
/// persistence substrate and for tests.
#[derive(Debug, Default)]
pub struct MemoryContainer {
    values: Mutex<HashMap<NamespacedKey, Value>>,
}

impl MemoryContainer {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored values.
    pub fn len(&self) -> usize {
        self.values().map(|v| v.len()).unwrap_or(0)
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn values(&self) -> ContainerResult<MutexGuard<'_, HashMap<NamespacedKey, Value>>> {
        self.values
            .lock()
            .map_err(|_| ContainerError::Backend("memory container lock poisoned".into()))
    }
}

impl Container for MemoryContainer {
    fn try_get(&self, key: &NamespacedKey, ty: &ValueType) -> ContainerResult<Option<Value>> {
        let values = self.values()?;
        match values.get(key) {
            Some(value) => {
                check_type(key, ty, value)?;
                Ok(Some(value.clone()))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &NamespacedKey, ty: &ValueType, value: Value) -> ContainerResult<()> {
        check_type(key, ty, &value)?;
        self.values()?.insert(key.clone(), value);
        Ok(())
    }

    fn remove(&self, key: &NamespacedKey) -> ContainerResult<()> {
        self.values()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> ContainerResult<Vec<NamespacedKey>> {
        Ok(self.values()?.keys().cloned().collect())
    }
}
