//! Per-owner property registry.
//!
//! The manager hands out reference-stable properties: asking twice for the
//! same owner and key returns the same `Arc`. It does not track owner
//! liveness; the host's session lifecycle calls [`PropertyManager::dispose`]
//! when an owner goes away.

use crate::config::{ExecutorKind, ManagerConfig};
use crate::dispatch::{InlineExecutor, SerialExecutor, TaskExecutor, TokioExecutor, WriteDispatcher};
use crate::domain::SyncDomain;
use crate::error::{PropertyError, PropertyResult};
use crate::list::{ListProperty, MutableListProperty};
use crate::property::{AnyProperty, Binding, Property};
use propkeep_container::Container;
use propkeep_types::{NamespacedKey, OwnerId, PropertyType};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info};

struct OwnerRegistry {
    binding: Binding,
    properties: HashMap<NamespacedKey, Arc<dyn AnyProperty>>,
}

/// Creates, caches and releases properties per owner.
pub struct PropertyManager<O = OwnerId> {
    config: ManagerConfig,
    domain: Arc<SyncDomain>,
    dispatcher: Arc<WriteDispatcher>,
    owners: RwLock<HashMap<O, OwnerRegistry>>,
}

impl<O> PropertyManager<O>
where
    O: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
    /// Builds the lock domain and executor described by `config`.
    ///
    /// The Tokio and serial executors need a running Tokio runtime.
    pub fn new(config: ManagerConfig) -> PropertyResult<Self> {
        config.validate()?;
        let domain = if config.lock_shards == 1 {
            SyncDomain::process_wide()
        } else {
            Arc::new(SyncDomain::sharded(config.lock_shards))
        };
        let executor: Arc<dyn TaskExecutor> = match config.executor {
            ExecutorKind::Tokio => Arc::new(TokioExecutor::current()?),
            ExecutorKind::Serial => Arc::new(SerialExecutor::current()?),
            ExecutorKind::Inline => Arc::new(InlineExecutor),
        };
        Ok(Self::with_parts(
            config,
            domain,
            Arc::new(WriteDispatcher::new(executor)),
        ))
    }

    /// Creates a manager over explicit collaborators.
    pub fn with_parts(
        config: ManagerConfig,
        domain: Arc<SyncDomain>,
        dispatcher: Arc<WriteDispatcher>,
    ) -> Self {
        Self {
            config,
            domain,
            dispatcher,
            owners: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Returns the lock domain shared by every property this manager creates.
    pub fn domain(&self) -> &Arc<SyncDomain> {
        &self.domain
    }

    /// Returns the write dispatcher.
    pub fn dispatcher(&self) -> &Arc<WriteDispatcher> {
        &self.dispatcher
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<O, OwnerRegistry>> {
        self.owners.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<O, OwnerRegistry>> {
        self.owners.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Owners ───────────────────────────────────────────────────

    /// Binds `owner` to its container.
    ///
    /// Returns false, leaving the existing binding in place, if the owner is
    /// already attached.
    pub fn attach(&self, owner: O, container: Arc<dyn Container>) -> bool {
        let mut owners = self.write();
        if owners.contains_key(&owner) {
            debug!(owner = ?owner, "owner already attached");
            return false;
        }
        let binding = Binding {
            container,
            domain: Arc::clone(&self.domain),
            dispatcher: Arc::clone(&self.dispatcher),
        };
        owners.insert(
            owner,
            OwnerRegistry {
                binding,
                properties: HashMap::new(),
            },
        );
        true
    }

    /// Returns true if `owner` has an attached container.
    pub fn is_attached(&self, owner: &O) -> bool {
        self.read().contains_key(owner)
    }

    /// Returns every attached owner.
    pub fn owners(&self) -> Vec<O> {
        self.read().keys().cloned().collect()
    }

    /// Returns the properties currently registered for `owner`.
    ///
    /// Unknown owners have none.
    pub fn for_owner(&self, owner: &O) -> Vec<Arc<dyn AnyProperty>> {
        self.read()
            .get(owner)
            .map(|registry| registry.properties.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Drops every property reference held for `owner` and detaches it.
    ///
    /// Stored values are left in the container. Returns the number of
    /// properties released.
    pub fn dispose(&self, owner: &O) -> usize {
        let released = self
            .write()
            .remove(owner)
            .map(|registry| registry.properties.len())
            .unwrap_or(0);
        info!(owner = ?owner, released, "disposed owner properties");
        released
    }

    /// Disposes `owner`, then waits up to the configured drain timeout for
    /// in-flight writes to finish.
    pub async fn dispose_and_flush(&self, owner: &O) -> PropertyResult<usize> {
        let released = self.dispose(owner);
        self.dispatcher
            .drain_timeout(self.config.drain_timeout())
            .await?;
        Ok(released)
    }

    /// Returns the number of writes still in flight, across all owners.
    pub fn pending_writes(&self) -> usize {
        self.dispatcher.pending()
    }

    /// Resolves once no writes are in flight.
    pub async fn flush(&self) {
        self.dispatcher.drain().await;
    }

    /// Blocks until no writes are in flight or `timeout` elapses.
    pub fn flush_blocking(&self, timeout: Duration) -> bool {
        self.dispatcher.drain_blocking(timeout)
    }

    // ── Creation ─────────────────────────────────────────────────

    /// Returns the scalar property for `(owner, key)`, creating it on first
    /// use.
    ///
    /// A later call with a different default is answered with the property
    /// from the first call.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not a valid key.
    pub fn create<T: PropertyType>(
        &self,
        owner: &O,
        key: &str,
        default: T,
    ) -> PropertyResult<Arc<Property<T>>> {
        self.register(owner, key, |binding, key| {
            Property::new(binding, key, default)
        })
    }

    /// Like [`create`](Self::create), with a merge function for writes.
    ///
    /// The merge runs under the domain lock; see [`MergeFn`](crate::MergeFn).
    pub fn create_with_merge<T, F>(
        &self,
        owner: &O,
        key: &str,
        default: T,
        merge: F,
    ) -> PropertyResult<Arc<Property<T>>>
    where
        T: PropertyType,
        F: Fn(T, Option<T>) -> T + Send + Sync + 'static,
    {
        self.register(owner, key, |binding, key| {
            Property::with_merge(binding, key, default, Arc::new(merge))
        })
    }

    /// Returns the read-only list property for `(owner, key)`.
    pub fn create_list<T: PropertyType>(
        &self,
        owner: &O,
        key: &str,
        default: Vec<T>,
    ) -> PropertyResult<Arc<ListProperty<T>>> {
        self.register(owner, key, |binding, key| {
            ListProperty::new(binding, key, default)
        })
    }

    /// Like [`create_list`](Self::create_list), with a merge function.
    pub fn create_list_with_merge<T, F>(
        &self,
        owner: &O,
        key: &str,
        default: Vec<T>,
        merge: F,
    ) -> PropertyResult<Arc<ListProperty<T>>>
    where
        T: PropertyType,
        F: Fn(Vec<T>, Option<Vec<T>>) -> Vec<T> + Send + Sync + 'static,
    {
        self.register(owner, key, |binding, key| {
            ListProperty::with_merge(binding, key, default, Arc::new(merge))
        })
    }

    /// Returns the copy-on-read list property for `(owner, key)`.
    pub fn create_mutable_list<T: PropertyType>(
        &self,
        owner: &O,
        key: &str,
        default: Vec<T>,
    ) -> PropertyResult<Arc<MutableListProperty<T>>> {
        self.register(owner, key, |binding, key| {
            MutableListProperty::new(binding, key, default)
        })
    }

    /// Like [`create_mutable_list`](Self::create_mutable_list), with a merge
    /// function.
    pub fn create_mutable_list_with_merge<T, F>(
        &self,
        owner: &O,
        key: &str,
        default: Vec<T>,
        merge: F,
    ) -> PropertyResult<Arc<MutableListProperty<T>>>
    where
        T: PropertyType,
        F: Fn(Vec<T>, Option<Vec<T>>) -> Vec<T> + Send + Sync + 'static,
    {
        self.register(owner, key, |binding, key| {
            MutableListProperty::with_merge(binding, key, default, Arc::new(merge))
        })
    }

    fn namespaced(&self, key: &str) -> NamespacedKey {
        NamespacedKey::new(self.config.namespace.as_str(), key)
            .unwrap_or_else(|e| panic!("invalid property key '{key}': {e}"))
    }

    fn register<P, B>(&self, owner: &O, key: &str, build: B) -> PropertyResult<Arc<P>>
    where
        P: AnyProperty,
        B: FnOnce(&Binding, NamespacedKey) -> P,
    {
        let key = self.namespaced(key);
        let mut owners = self.write();
        let registry = owners
            .get_mut(owner)
            .ok_or_else(|| PropertyError::UnknownOwner(format!("{owner:?}")))?;

        if let Some(existing) = registry.properties.get(&key) {
            let existing_name = existing.type_name();
            return Arc::clone(existing)
                .into_any()
                .downcast::<P>()
                .map(|property| {
                    debug!(key = %key, "property already registered, keeping first registration");
                    property
                })
                .map_err(|_| PropertyError::TypeConflict {
                    key: key.to_string(),
                    existing: existing_name,
                    requested: std::any::type_name::<P>(),
                });
        }

        let property = Arc::new(build(&registry.binding, key.clone()));
        let erased: Arc<dyn AnyProperty> = Arc::clone(&property) as Arc<dyn AnyProperty>;
        registry.properties.insert(key.clone(), erased);
        debug!(owner = ?owner, key = %key, "registered property");
        Ok(property)
    }
}

impl<O: Debug> Debug for PropertyManager<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyManager")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
