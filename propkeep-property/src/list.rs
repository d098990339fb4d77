//! List-valued properties.
//!
//! Both flavours store the whole sequence under one key, and the merge
//! function sees whole sequences. [`ListProperty`] hands out a shared
//! read-only view. [`MutableListProperty`] hands out an owned copy that is
//! only persisted through an explicit `set` or `update`.

use crate::dispatch::WriteDispatcher;
use crate::error::{PropertyError, PropertyResult};
use crate::property::{report, AnyProperty, Binding, PropertyKind};
use crate::slot::{replace, MergeFn, Sequence, Slot};
use propkeep_types::{NamespacedKey, PropertyType, ValueType};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A persistent sequence read as an immutable view.
pub struct ListProperty<T: PropertyType> {
    slot: Arc<Slot<Sequence<T>>>,
    dispatcher: Arc<WriteDispatcher>,
}

impl<T: PropertyType> ListProperty<T> {
    /// Creates a list property whose writes replace the stored sequence.
    pub fn new(binding: &Binding, key: NamespacedKey, default: Vec<T>) -> Self {
        Self::with_merge(binding, key, default, replace())
    }

    /// Creates a list property whose writes go through `merge`.
    pub fn with_merge(
        binding: &Binding,
        key: NamespacedKey,
        default: Vec<T>,
        merge: MergeFn<Vec<T>>,
    ) -> Self {
        Self {
            slot: Arc::new(Slot::new(
                key,
                default,
                merge,
                Arc::clone(&binding.container),
                Arc::clone(&binding.domain),
            )),
            dispatcher: Arc::clone(&binding.dispatcher),
        }
    }

    pub fn key(&self) -> &NamespacedKey {
        self.slot.key()
    }

    pub fn default_value(&self) -> &[T] {
        self.slot.default_value()
    }

    pub fn is_seeded(&self) -> bool {
        self.slot.is_seeded()
    }

    /// Reads the sequence, seeding the default if none is stored.
    ///
    /// Falls back to the default (and calls `on_error`) on failure.
    pub fn get(&self, on_error: impl FnOnce(PropertyError)) -> Arc<[T]> {
        match self.slot.get_or_seed() {
            Ok(items) => items.into(),
            Err(e) => {
                report(self.key(), e, on_error);
                self.slot.default_value().as_slice().into()
            }
        }
    }

    pub fn try_get(&self) -> PropertyResult<Arc<[T]>> {
        self.slot.get_or_seed().map(Into::into)
    }

    /// Persists `merge(items, previous)` in the background.
    pub fn set<S, E>(&self, items: Vec<T>, on_success: S, on_error: E)
    where
        S: FnOnce() + Send + 'static,
        E: FnOnce(PropertyError) + Send + 'static,
    {
        let slot = Arc::clone(&self.slot);
        self.dispatcher
            .submit(move || slot.write_merged(items), on_success, on_error);
    }

    pub fn remove(&self, on_error: impl FnOnce(PropertyError)) {
        if let Err(e) = self.slot.remove() {
            report(self.key(), e, on_error);
        }
    }
}

/// A persistent sequence read as an owned, independent copy.
///
/// Mutating the returned `Vec` changes nothing until it is passed to
/// [`set`](Self::set).
pub struct MutableListProperty<T: PropertyType> {
    slot: Arc<Slot<Sequence<T>>>,
    dispatcher: Arc<WriteDispatcher>,
}

impl<T: PropertyType> MutableListProperty<T> {
    /// Creates a list property whose writes replace the stored sequence.
    pub fn new(binding: &Binding, key: NamespacedKey, default: Vec<T>) -> Self {
        Self::with_merge(binding, key, default, replace())
    }

    /// Creates a list property whose writes go through `merge`.
    pub fn with_merge(
        binding: &Binding,
        key: NamespacedKey,
        default: Vec<T>,
        merge: MergeFn<Vec<T>>,
    ) -> Self {
        Self {
            slot: Arc::new(Slot::new(
                key,
                default,
                merge,
                Arc::clone(&binding.container),
                Arc::clone(&binding.domain),
            )),
            dispatcher: Arc::clone(&binding.dispatcher),
        }
    }

    pub fn key(&self) -> &NamespacedKey {
        self.slot.key()
    }

    pub fn default_value(&self) -> &[T] {
        self.slot.default_value()
    }

    pub fn is_seeded(&self) -> bool {
        self.slot.is_seeded()
    }

    /// Returns a fresh copy of the sequence, seeding the default if none is
    /// stored.
    pub fn get(&self, on_error: impl FnOnce(PropertyError)) -> Vec<T> {
        match self.slot.get_or_seed() {
            Ok(items) => items,
            Err(e) => {
                report(self.key(), e, on_error);
                self.slot.default_value().clone()
            }
        }
    }

    pub fn try_get(&self) -> PropertyResult<Vec<T>> {
        self.slot.get_or_seed()
    }

    /// Persists `merge(items, previous)` in the background.
    pub fn set<S, E>(&self, items: Vec<T>, on_success: S, on_error: E)
    where
        S: FnOnce() + Send + 'static,
        E: FnOnce(PropertyError) + Send + 'static,
    {
        let slot = Arc::clone(&self.slot);
        self.dispatcher
            .submit(move || slot.write_merged(items), on_success, on_error);
    }

    /// Edits a copy of the stored sequence and persists it, all in one
    /// background step under the lock.
    ///
    /// `edit` sees the default when nothing is stored. The result still goes
    /// through the merge function. Like the merge, `edit` runs with the
    /// domain lock held and must not touch properties in the same domain.
    pub fn update<F, S, E>(&self, edit: F, on_success: S, on_error: E)
    where
        F: FnOnce(&mut Vec<T>) + Send + 'static,
        S: FnOnce() + Send + 'static,
        E: FnOnce(PropertyError) + Send + 'static,
    {
        let slot = Arc::clone(&self.slot);
        self.dispatcher
            .submit(move || slot.edit_merged(edit), on_success, on_error);
    }

    pub fn remove(&self, on_error: impl FnOnce(PropertyError)) {
        if let Err(e) = self.slot.remove() {
            report(self.key(), e, on_error);
        }
    }
}

macro_rules! list_any_property {
    ($ty:ident, $kind:expr) => {
        impl<T: PropertyType> AnyProperty for $ty<T> {
            fn key(&self) -> &NamespacedKey {
                self.slot.key()
            }

            fn value_type(&self) -> &ValueType {
                self.slot.value_type()
            }

            fn kind(&self) -> PropertyKind {
                $kind
            }

            fn is_seeded(&self) -> bool {
                self.slot.is_seeded()
            }

            fn remove_stored(&self, on_error: &mut dyn FnMut(PropertyError)) {
                self.remove(on_error);
            }

            fn type_name(&self) -> &'static str {
                std::any::type_name::<Self>()
            }

            fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
                self
            }
        }

        impl<T: PropertyType + fmt::Debug> fmt::Debug for $ty<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("key", self.key())
                    .field("default", &self.default_value())
                    .field("seeded", &self.is_seeded())
                    .finish()
            }
        }
    };
}

list_any_property!(ListProperty, PropertyKind::List);
list_any_property!(MutableListProperty, PropertyKind::MutableList);
