//! Synchronization domain.
//!
//! Every container access issued by this crate happens while holding a lock
//! from a [`SyncDomain`]. The default domain is a single process-wide mutex,
//! so no two container calls ever interleave. A sharded domain trades that
//! total order for per-key-hash exclusion without changing how properties
//! use it.

use propkeep_types::NamespacedKey;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

static PROCESS_WIDE: OnceLock<Arc<SyncDomain>> = OnceLock::new();

/// A set of mutexes guarding container access.
#[derive(Debug)]
pub struct SyncDomain {
    shards: Box<[Mutex<()>]>,
}

impl SyncDomain {
    /// A domain with one lock for every key.
    #[must_use]
    pub fn global() -> Self {
        Self::sharded(1)
    }

    /// A domain with `shards` locks, selected by key hash.
    ///
    /// # Panics
    ///
    /// Panics if `shards` is zero.
    #[must_use]
    pub fn sharded(shards: usize) -> Self {
        assert!(shards > 0, "a sync domain needs at least one shard");
        Self {
            shards: (0..shards).map(|_| Mutex::new(())).collect(),
        }
    }

    /// The single global domain shared by the whole process.
    pub fn process_wide() -> Arc<Self> {
        Arc::clone(PROCESS_WIDE.get_or_init(|| Arc::new(Self::global())))
    }

    /// Returns the number of locks in this domain.
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Returns the index of the lock guarding `key`.
    #[must_use]
    pub fn shard_for(&self, key: &NamespacedKey) -> usize {
        if self.shards.len() == 1 {
            return 0;
        }
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    /// Acquires the lock guarding `key`.
    ///
    /// The lock protects no data, so a poisoned lock is simply reclaimed.
    pub fn lock(&self, key: &NamespacedKey) -> MutexGuard<'_, ()> {
        self.shards[self.shard_for(key)]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SyncDomain {
    fn default() -> Self {
        Self::global()
    }
}
