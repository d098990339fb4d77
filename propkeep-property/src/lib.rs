//! Typed persistent properties for propkeep.
//!
//! A property is a named, typed attribute backed by a host [`Container`].
//! This crate provides:
//!
//! - [`Property<T>`]: a single value with seed-on-first-read and merged
//!   background writes
//! - [`ListProperty<T>`] / [`MutableListProperty<T>`]: sequence values,
//!   read as a shared view or as an owned copy
//! - [`PropertyManager`]: per-owner registry returning reference-stable
//!   properties
//! - [`SyncDomain`]: the lock serializing every container access
//! - [`WriteDispatcher`]: background write execution with a drain hook
//!
//! # Guarantees
//!
//! - A read that finds nothing stored writes the default before returning
//!   it, under the same lock, so the absence is observed once.
//! - Writes return immediately; each one later calls exactly one of its
//!   success or error callbacks.
//! - Container failures are reported through callbacks and never panic the
//!   caller. A failed read returns the default.
//!
//! [`Container`]: propkeep_container::Container

mod config;
mod dispatch;
mod domain;
mod error;
mod list;
mod manager;
mod property;
mod slot;

pub use config::{ExecutorKind, ManagerConfig};
pub use dispatch::{
    InlineExecutor, SerialExecutor, TaskExecutor, TokioExecutor, WriteDispatcher, WriteTask,
};
pub use domain::SyncDomain;
pub use error::{PropertyError, PropertyResult};
pub use list::{ListProperty, MutableListProperty};
pub use manager::PropertyManager;
pub use property::{AnyProperty, Binding, Property, PropertyKind};
pub use slot::{replace, MergeFn};
