//! Scalar properties.

use crate::dispatch::WriteDispatcher;
use crate::domain::SyncDomain;
use crate::error::{PropertyError, PropertyResult};
use crate::slot::{replace, MergeFn, Scalar, Slot};
use propkeep_container::Container;
use propkeep_types::{NamespacedKey, PropertyType, ValueType};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// The collaborators a property is bound to.
#[derive(Clone)]
pub struct Binding {
    /// Where values are stored.
    pub container: Arc<dyn Container>,
    /// Serializes container access.
    pub domain: Arc<SyncDomain>,
    /// Runs writes in the background.
    pub dispatcher: Arc<WriteDispatcher>,
}

impl Binding {
    /// Binds to `container` using the process-wide domain.
    pub fn new(container: Arc<dyn Container>, dispatcher: Arc<WriteDispatcher>) -> Self {
        Self {
            container,
            domain: SyncDomain::process_wide(),
            dispatcher,
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("domain", &self.domain)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// Which flavour of property a registration holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Scalar,
    List,
    MutableList,
}

/// Type-erased view of a registered property.
///
/// Lets cleanup code enumerate and remove properties without knowing their
/// value types.
pub trait AnyProperty: Send + Sync + 'static {
    /// The key the property is stored under.
    fn key(&self) -> &NamespacedKey;

    /// The declared container type.
    fn value_type(&self) -> &ValueType;

    /// The property flavour.
    fn kind(&self) -> PropertyKind;

    /// Whether this process has read or written the value since creation
    /// (or since the last remove).
    fn is_seeded(&self) -> bool;

    /// Deletes the stored value, reporting failure to `on_error`.
    fn remove_stored(&self, on_error: &mut dyn FnMut(PropertyError));

    /// Rust type name of the concrete property, for conflict messages.
    fn type_name(&self) -> &'static str;

    #[doc(hidden)]
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Reports `error` for `key` and hands it to the caller's callback.
pub(crate) fn report(key: &NamespacedKey, error: PropertyError, on_error: impl FnOnce(PropertyError)) {
    warn!(key = %key, error = %error, "property access failed");
    on_error(error);
}

/// A named, typed, persistent value.
///
/// Reads block only for the lock and the container call. Writes are merged
/// with the stored value and applied in the background.
pub struct Property<T: PropertyType> {
    slot: Arc<Slot<Scalar<T>>>,
    dispatcher: Arc<WriteDispatcher>,
}

impl<T: PropertyType> Property<T> {
    /// Creates a property whose writes replace the stored value.
    pub fn new(binding: &Binding, key: NamespacedKey, default: T) -> Self {
        Self::with_merge(binding, key, default, replace())
    }

    /// Creates a property whose writes go through `merge`.
    ///
    /// See [`MergeFn`] for what `merge` may not do.
    pub fn with_merge(binding: &Binding, key: NamespacedKey, default: T, merge: MergeFn<T>) -> Self {
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

    /// Returns the key.
    pub fn key(&self) -> &NamespacedKey {
        self.slot.key()
    }

    /// Returns the default value.
    pub fn default_value(&self) -> &T {
        self.slot.default_value()
    }

    /// Whether this process has read or written the value.
    pub fn is_seeded(&self) -> bool {
        self.slot.is_seeded()
    }

    /// Reads the value, seeding the default if none is stored.
    ///
    /// On a container failure, `on_error` is called once and the default is
    /// returned. The default is not considered persisted in that case.
    pub fn get(&self, on_error: impl FnOnce(PropertyError)) -> T {
        match self.slot.get_or_seed() {
            Ok(value) => value,
            Err(e) => {
                report(self.key(), e, on_error);
                self.slot.default_value().clone()
            }
        }
    }

    /// Reads the value, seeding the default if none is stored.
    pub fn try_get(&self) -> PropertyResult<T> {
        self.slot.get_or_seed()
    }

    /// Persists `merge(value, previous)` in the background.
    ///
    /// Returns immediately. Exactly one of `on_success` or `on_error` runs
    /// once the write finishes. A failed write leaves the stored value as it
    /// was.
    pub fn set<S, E>(&self, value: T, on_success: S, on_error: E)
    where
        S: FnOnce() + Send + 'static,
        E: FnOnce(PropertyError) + Send + 'static,
    {
        let slot = Arc::clone(&self.slot);
        self.dispatcher
            .submit(move || slot.write_merged(value), on_success, on_error);
    }

    /// Deletes the stored value.
    ///
    /// The next `get` seeds the default again.
    pub fn remove(&self, on_error: impl FnOnce(PropertyError)) {
        if let Err(e) = self.slot.remove() {
            report(self.key(), e, on_error);
        }
    }
}

impl<T: PropertyType> AnyProperty for Property<T> {
    fn key(&self) -> &NamespacedKey {
        self.slot.key()
    }

    fn value_type(&self) -> &ValueType {
        self.slot.value_type()
    }

    fn kind(&self) -> PropertyKind {
        PropertyKind::Scalar
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

impl<T: PropertyType + fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("key", self.key())
            .field("default", self.default_value())
            .field("seeded", &self.is_seeded())
            .finish()
    }
}
