//! Shared read/seed/merge/write logic behind every property kind.

use crate::domain::SyncDomain;
use crate::error::PropertyResult;
use propkeep_container::Container;
use propkeep_types::{NamespacedKey, PropertyType, Value, ValueType};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Maps a property's in-memory value to the container representation.
pub(crate) trait Codec: 'static {
    type Item: Clone + Send + Sync + 'static;

    fn value_type() -> ValueType;
    fn encode(item: &Self::Item) -> propkeep_types::Result<Value>;
    fn decode(value: Value) -> propkeep_types::Result<Self::Item>;
}

/// A single value of `T`.
pub(crate) struct Scalar<T>(PhantomData<fn() -> T>);

impl<T: PropertyType> Codec for Scalar<T> {
    type Item = T;

    fn value_type() -> ValueType {
        T::value_type()
    }

    fn encode(item: &T) -> propkeep_types::Result<Value> {
        item.to_value()
    }

    fn decode(value: Value) -> propkeep_types::Result<T> {
        T::from_value(value)
    }
}

/// An ordered sequence of `T`, stored as a list.
pub(crate) struct Sequence<T>(PhantomData<fn() -> T>);

impl<T: PropertyType> Codec for Sequence<T> {
    type Item = Vec<T>;

    fn value_type() -> ValueType {
        ValueType::list_of(T::value_type())
    }

    fn encode(item: &Vec<T>) -> propkeep_types::Result<Value> {
        Value::from_list(item)
    }

    fn decode(value: Value) -> propkeep_types::Result<Vec<T>> {
        value.into_list()
    }
}

/// Computes the value to persist from the incoming value and the previous one.
///
/// Runs in the background task while the domain lock for the key is held.
/// It must not read or write properties bound to the same [`SyncDomain`];
/// the lock is not reentrant, so doing so deadlocks or panics.
pub type MergeFn<T> = Arc<dyn Fn(T, Option<T>) -> T + Send + Sync>;

/// The merge used when none is supplied: the incoming value replaces.
pub fn replace<T>() -> MergeFn<T> {
    Arc::new(|incoming, _previous| incoming)
}

pub(crate) struct Slot<C: Codec> {
    key: NamespacedKey,
    value_type: ValueType,
    default: C::Item,
    merge: MergeFn<C::Item>,
    container: Arc<dyn Container>,
    domain: Arc<SyncDomain>,
    seeded: AtomicBool,
}

impl<C: Codec> Slot<C> {
    pub(crate) fn new(
        key: NamespacedKey,
        default: C::Item,
        merge: MergeFn<C::Item>,
        container: Arc<dyn Container>,
        domain: Arc<SyncDomain>,
    ) -> Self {
        Self {
            key,
            value_type: C::value_type(),
            default,
            merge,
            container,
            domain,
            seeded: AtomicBool::new(false),
        }
    }

    pub(crate) fn key(&self) -> &NamespacedKey {
        &self.key
    }

    pub(crate) fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub(crate) fn default_value(&self) -> &C::Item {
        &self.default
    }

    pub(crate) fn is_seeded(&self) -> bool {
        self.seeded.load(Ordering::Acquire)
    }

    /// Reads the stored value, seeding the default if nothing is stored.
    ///
    /// Read and seed happen under one lock acquisition so a second caller
    /// never observes the absence.
    pub(crate) fn get_or_seed(&self) -> PropertyResult<C::Item> {
        let _guard = self.domain.lock(&self.key);
        if let Some(current) = self.read_locked()? {
            self.seeded.store(true, Ordering::Release);
            return Ok(current);
        }

        let encoded = C::encode(&self.default)?;
        self.container.set(&self.key, &self.value_type, encoded)?;
        self.seeded.store(true, Ordering::Release);
        debug!(key = %self.key, "seeded default value");
        Ok(self.default.clone())
    }

    /// Merges `incoming` with the stored value and writes the result.
    ///
    /// Absence is passed to the merge as `None`; nothing is seeded first.
    pub(crate) fn write_merged(&self, incoming: C::Item) -> PropertyResult<()> {
        let _guard = self.domain.lock(&self.key);
        let previous = self.read_locked()?;
        self.write_locked(incoming, previous)
    }

    /// Applies `edit` to a copy of the current value (or the default when
    /// absent), then merges and writes the result.
    pub(crate) fn edit_merged<F>(&self, edit: F) -> PropertyResult<()>
    where
        F: FnOnce(&mut C::Item),
    {
        let _guard = self.domain.lock(&self.key);
        let previous = self.read_locked()?;
        let mut working = previous.clone().unwrap_or_else(|| self.default.clone());
        edit(&mut working);
        self.write_locked(working, previous)
    }

    /// Deletes the stored value. The slot becomes unseeded again.
    pub(crate) fn remove(&self) -> PropertyResult<()> {
        let _guard = self.domain.lock(&self.key);
        self.container.remove(&self.key)?;
        self.seeded.store(false, Ordering::Release);
        debug!(key = %self.key, "removed stored value");
        Ok(())
    }

    fn read_locked(&self) -> PropertyResult<Option<C::Item>> {
        match self.container.try_get(&self.key, &self.value_type)? {
            Some(value) => Ok(Some(C::decode(value)?)),
            None => Ok(None),
        }
    }

    fn write_locked(&self, incoming: C::Item, previous: Option<C::Item>) -> PropertyResult<()> {
        let effective = (self.merge)(incoming, previous);
        let encoded = C::encode(&effective)?;
        self.container.set(&self.key, &self.value_type, encoded)?;
        self.seeded.store(true, Ordering::Release);
        Ok(())
    }
}
