//! Shared test helpers for property tests.

#![allow(dead_code)]

use propkeep_container::{Container, ContainerError, ContainerResult, MemoryContainer};
use propkeep_property::{Binding, PropertyError, SyncDomain, WriteDispatcher};
use propkeep_types::{NamespacedKey, Value, ValueType};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Installs a test subscriber once; respects `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn key(k: &str) -> NamespacedKey {
    NamespacedKey::new("test", k).unwrap()
}

/// Which container operation a failure is injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    Set,
    Remove,
}

/// A memory container that counts calls and fails on request.
#[derive(Default)]
pub struct ScriptedContainer {
    inner: MemoryContainer,
    failures: Mutex<HashSet<(Op, String)>>,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
    pub removes: AtomicUsize,
}

impl ScriptedContainer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes `op` on the key part `k` fail until cleared.
    pub fn fail(&self, op: Op, k: &str) {
        self.failures.lock().unwrap().insert((op, k.to_string()));
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn inner(&self) -> &MemoryContainer {
        &self.inner
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    fn check(&self, op: Op, key: &NamespacedKey) -> ContainerResult<()> {
        if self.failures.lock().unwrap().contains(&(op, key.key().to_string())) {
            Err(ContainerError::Backend(format!("injected {op:?} failure for {key}")))
        } else {
            Ok(())
        }
    }
}

impl Container for ScriptedContainer {
    fn try_get(&self, key: &NamespacedKey, ty: &ValueType) -> ContainerResult<Option<Value>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check(Op::Get, key)?;
        self.inner.try_get(key, ty)
    }

    fn set(&self, key: &NamespacedKey, ty: &ValueType, value: Value) -> ContainerResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.check(Op::Set, key)?;
        self.inner.set(key, ty, value)
    }

    fn remove(&self, key: &NamespacedKey) -> ContainerResult<()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.check(Op::Remove, key)?;
        self.inner.remove(key)
    }

    fn keys(&self) -> ContainerResult<Vec<NamespacedKey>> {
        self.inner.keys()
    }
}

/// A binding whose writes run inline on a private domain.
pub fn inline_binding(container: Arc<dyn Container>) -> Binding {
    Binding {
        container,
        domain: Arc::new(SyncDomain::global()),
        dispatcher: Arc::new(WriteDispatcher::inline()),
    }
}

/// Collects errors handed to callbacks.
#[derive(Clone, Default)]
pub struct Errors(Arc<Mutex<Vec<String>>>);

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> impl FnOnce(PropertyError) + Send + 'static {
        let errors = Arc::clone(&self.0);
        move |e| errors.lock().unwrap().push(e.to_string())
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

/// Counts success callbacks.
#[derive(Clone, Default)]
pub struct Successes(Arc<AtomicUsize>);

impl Successes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> impl FnOnce() + Send + 'static {
        let hits = Arc::clone(&self.0);
        move || {
            hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn no_error() -> impl FnOnce(PropertyError) + Send + 'static {
    |e| panic!("unexpected error: {e}")
}

pub fn ignore() -> impl FnOnce() + Send + 'static {
    || {}
}
