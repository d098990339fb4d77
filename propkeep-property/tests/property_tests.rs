mod common;

use common::{ignore, inline_binding, key, no_error, Errors, Op, ScriptedContainer, Successes};
use propkeep_container::{Container, MemoryContainer, SqliteContainer};
use propkeep_property::{Binding, Property, PropertyError, SyncDomain, WriteDispatcher};
use propkeep_types::{Json, Value, ValueType};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

fn sum_merge() -> propkeep_property::MergeFn<i32> {
    Arc::new(|incoming: i32, previous: Option<i32>| previous.unwrap_or(0) + incoming)
}

// ── Seeding ──────────────────────────────────────────────────────

#[test]
fn first_get_returns_default_and_seeds_it() {
    common::init_tracing();
    let container = ScriptedContainer::new();
    let property = Property::new(&inline_binding(container.clone()), key("coins"), 25_i32);

    assert!(!property.is_seeded());
    assert_eq!(property.get(no_error()), 25);
    assert!(property.is_seeded());
    assert_eq!(container.sets(), 1);

    // The container itself now reports the default.
    assert_eq!(
        container.inner().try_get(&key("coins"), &ValueType::Int).unwrap(),
        Some(Value::Int(25))
    );
}

#[test]
fn seeding_happens_once() {
    let container = ScriptedContainer::new();
    let property = Property::new(&inline_binding(container.clone()), key("coins"), 25_i32);

    property.get(no_error());
    property.get(no_error());
    property.get(no_error());

    assert_eq!(container.sets(), 1);
    assert_eq!(container.gets(), 3);
}

#[test]
fn existing_value_is_not_overwritten_by_default() {
    let container = ScriptedContainer::new();
    container
        .inner()
        .set(&key("coins"), &ValueType::Int, Value::Int(99))
        .unwrap();
    let property = Property::new(&inline_binding(container.clone()), key("coins"), 0_i32);

    assert_eq!(property.get(no_error()), 99);
    assert_eq!(container.sets(), 0);
    assert!(property.is_seeded());
}

#[test]
fn try_get_surfaces_the_error() {
    let container = ScriptedContainer::new();
    container.fail(Op::Get, "coins");
    let property = Property::new(&inline_binding(container), key("coins"), 1_i32);
    assert!(matches!(property.try_get(), Err(PropertyError::Container(_))));
}

// ── Error fallback ───────────────────────────────────────────────

#[test]
fn failed_read_returns_default_and_reports_once() {
    let container = ScriptedContainer::new();
    container.fail(Op::Get, "x");
    let property = Property::new(&inline_binding(container.clone()), key("x"), 7_i64);

    let errors = Errors::new();
    assert_eq!(property.get(errors.sink()), 7);
    assert_eq!(errors.count(), 1);
    assert!(errors.all()[0].contains("injected Get failure"));

    // Nothing was persisted on the failure path.
    assert!(!property.is_seeded());
    assert_eq!(container.sets(), 0);
}

#[test]
fn failed_seed_write_returns_default_and_reports() {
    let container = ScriptedContainer::new();
    container.fail(Op::Set, "x");
    let property = Property::new(&inline_binding(container.clone()), key("x"), 3_i16);

    let errors = Errors::new();
    assert_eq!(property.get(errors.sink()), 3);
    assert_eq!(errors.count(), 1);
    assert!(!property.is_seeded());
    assert!(container.inner().is_empty());
}

#[test]
fn stored_value_of_wrong_type_falls_back_to_default() {
    let container = Arc::new(MemoryContainer::new());
    container
        .set(&key("name"), &ValueType::String, Value::String("ada".into()))
        .unwrap();
    let property = Property::new(&inline_binding(container), key("name"), 5_i32);

    let errors = Errors::new();
    assert_eq!(property.get(errors.sink()), 5);
    assert!(errors.all()[0].contains("type mismatch"));
}

// ── Writes ───────────────────────────────────────────────────────

#[test]
fn read_after_write() {
    let container = Arc::new(MemoryContainer::new());
    let property = Property::new(&inline_binding(container), key("title"), String::from("none"));

    let successes = Successes::new();
    property.set("champion".to_string(), successes.sink(), no_error());
    assert_eq!(successes.count(), 1);
    assert_eq!(property.get(no_error()), "champion");
}

#[test]
fn merge_accumulates_from_absent() {
    let container = Arc::new(MemoryContainer::new());
    let property = Property::with_merge(&inline_binding(container.clone()), key("kills"), 0, sum_merge());

    property.set(5, ignore(), no_error());
    assert_eq!(
        container.try_get(&key("kills"), &ValueType::Int).unwrap(),
        Some(Value::Int(5))
    );

    property.set(5, ignore(), no_error());
    assert_eq!(
        container.try_get(&key("kills"), &ValueType::Int).unwrap(),
        Some(Value::Int(10))
    );
}

#[test]
fn set_on_unseeded_key_passes_none_to_merge() {
    let container = Arc::new(MemoryContainer::new());
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let property = Property::with_merge(
        &inline_binding(container),
        key("k"),
        100_i32,
        Arc::new(move |incoming: i32, previous: Option<i32>| {
            record.lock().unwrap().push(previous);
            incoming
        }),
    );

    property.set(1, ignore(), no_error());
    property.set(2, ignore(), no_error());
    assert_eq!(*seen.lock().unwrap(), vec![None, Some(1)]);
}

#[test]
fn failed_write_leaves_prior_value() {
    let container = ScriptedContainer::new();
    let property = Property::new(&inline_binding(container.clone()), key("k"), 1_i32);
    property.set(2, ignore(), no_error());

    container.fail(Op::Set, "k");
    let errors = Errors::new();
    let successes = Successes::new();
    property.set(3, successes.sink(), errors.sink());

    assert_eq!(successes.count(), 0);
    assert_eq!(errors.count(), 1);
    container.clear_failures();
    assert_eq!(property.get(no_error()), 2);
}

#[test]
fn failed_previous_read_fails_the_write() {
    let container = ScriptedContainer::new();
    let property = Property::with_merge(&inline_binding(container.clone()), key("k"), 0, sum_merge());
    container.fail(Op::Get, "k");

    let errors = Errors::new();
    property.set(4, || panic!("must not succeed"), errors.sink());
    assert_eq!(errors.count(), 1);
    assert_eq!(container.sets(), 0);
}

#[test]
fn panicking_merge_reports_write_aborted() {
    let container = Arc::new(MemoryContainer::new());
    let property = Property::with_merge(
        &inline_binding(container.clone()),
        key("k"),
        0_i32,
        Arc::new(|_: i32, _: Option<i32>| -> i32 { panic!("bad merge") }),
    );

    let errors = Errors::new();
    property.set(1, || panic!("must not succeed"), errors.sink());
    assert_eq!(errors.count(), 1);
    assert!(errors.all()[0].contains("bad merge"));
    assert!(container.is_empty());

    // The lock was released despite the panic.
    assert_eq!(property.get(no_error()), 0);
}

// ── Remove ───────────────────────────────────────────────────────

#[test]
fn remove_deletes_and_next_get_reseeds() {
    let container = ScriptedContainer::new();
    let property = Property::new(&inline_binding(container.clone()), key("k"), 8_i32);
    property.set(42, ignore(), no_error());
    assert!(property.is_seeded());

    property.remove(no_error());
    assert!(!property.is_seeded());
    assert!(container.inner().is_empty());

    assert_eq!(property.get(no_error()), 8);
    assert!(property.is_seeded());
    assert_eq!(
        container.inner().try_get(&key("k"), &ValueType::Int).unwrap(),
        Some(Value::Int(8))
    );
}

#[test]
fn failed_remove_is_reported_not_thrown() {
    let container = ScriptedContainer::new();
    container.fail(Op::Remove, "k");
    let property = Property::new(&inline_binding(container), key("k"), 8_i32);
    property.get(no_error());

    let errors = Errors::new();
    property.remove(errors.sink());
    assert_eq!(errors.count(), 1);
    assert!(property.is_seeded());
}

// ── Value types ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Loadout {
    primary: String,
    ammo: u32,
}

#[test]
fn json_property_roundtrip() {
    let container = Arc::new(MemoryContainer::new());
    let default = Json(Loadout { primary: "bow".into(), ammo: 16 });
    let property = Property::new(&inline_binding(container), key("loadout"), default.clone());

    assert_eq!(property.get(no_error()), default);
    let sword = Json(Loadout { primary: "sword".into(), ammo: 0 });
    property.set(sword.clone(), ignore(), no_error());
    assert_eq!(property.get(no_error()).into_inner(), sword.0);
}

#[test]
fn properties_share_a_container_but_not_keys() {
    let container = Arc::new(MemoryContainer::new());
    let binding = inline_binding(container.clone());
    let a = Property::new(&binding, key("a"), true);
    let b = Property::new(&binding, key("b"), 1.5_f64);

    a.set(false, ignore(), no_error());
    assert_eq!(b.get(no_error()), 1.5);
    assert!(!a.get(no_error()));
    assert_eq!(container.len(), 2);
}

#[test]
fn non_finite_write_to_sqlite_fails_and_key_stays_writable() {
    let container = Arc::new(SqliteContainer::open_in_memory().unwrap());
    let property = Property::new(&inline_binding(container), key("speed"), 1.0_f64);
    property.set(2.0, ignore(), no_error());

    let errors = Errors::new();
    property.set(f64::INFINITY, || panic!("must not succeed"), errors.sink());
    assert_eq!(errors.count(), 1);
    assert!(errors.all()[0].contains("non-finite"));

    assert_eq!(property.get(no_error()), 2.0);
    property.set(3.0, ignore(), no_error());
    assert_eq!(property.get(no_error()), 3.0);
}

// ── Bindings and domains ─────────────────────────────────────────

#[test]
fn bindings_built_with_new_share_the_process_wide_domain() {
    let dispatcher = Arc::new(WriteDispatcher::inline());
    let first = Binding::new(Arc::new(MemoryContainer::new()), Arc::clone(&dispatcher));
    let second = Binding::new(Arc::new(MemoryContainer::new()), dispatcher);

    assert!(Arc::ptr_eq(&first.domain, &second.domain));
    assert!(Arc::ptr_eq(&first.domain, &SyncDomain::process_wide()));

    let a = Property::new(&first, key("level"), 1_i32);
    let b = Property::new(&second, key("level"), 1_i32);
    a.set(7, ignore(), no_error());
    assert_eq!(a.get(no_error()), 7);
    assert_eq!(b.get(no_error()), 1);
}

#[test]
fn merge_may_read_a_property_in_another_domain() {
    let limits = inline_binding(Arc::new(MemoryContainer::new()));
    let cap = Arc::new(Property::new(&limits, key("cap"), 10_i32));

    let reader = Arc::clone(&cap);
    let property = Property::with_merge(
        &inline_binding(Arc::new(MemoryContainer::new())),
        key("ammo"),
        0_i32,
        Arc::new(move |incoming: i32, previous: Option<i32>| {
            (previous.unwrap_or(0) + incoming).min(reader.get(|_| {}))
        }),
    );

    property.set(6, ignore(), no_error());
    property.set(6, ignore(), no_error());
    assert_eq!(property.get(no_error()), 10);
}

// ── Background execution ─────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn serial_writes_apply_in_order_and_drain() {
    let container = Arc::new(MemoryContainer::new());
    let dispatcher = Arc::new(WriteDispatcher::new(Arc::new(
        propkeep_property::SerialExecutor::current().unwrap(),
    )));
    let binding = Binding {
        container: container.clone(),
        domain: Arc::new(SyncDomain::global()),
        dispatcher: Arc::clone(&dispatcher),
    };
    let property = Property::with_merge(&binding, key("kills"), 0, sum_merge());

    let (tx, rx) = tokio::sync::oneshot::channel();
    property.set(5, move || tx.send(()).unwrap(), no_error());
    rx.await.unwrap();
    dispatcher.drain().await;

    property.set(5, ignore(), no_error());
    dispatcher.drain().await;
    assert_eq!(dispatcher.pending(), 0);
    assert_eq!(property.try_get().unwrap(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_merged_writes_lose_nothing() {
    let container = Arc::new(MemoryContainer::new());
    let dispatcher = Arc::new(WriteDispatcher::new(Arc::new(
        propkeep_property::TokioExecutor::current().unwrap(),
    )));
    let binding = Binding {
        container,
        domain: Arc::new(SyncDomain::global()),
        dispatcher: Arc::clone(&dispatcher),
    };
    let property = Arc::new(Property::with_merge(&binding, key("total"), 0, sum_merge()));

    for _ in 0..200 {
        property.set(1, ignore(), no_error());
    }
    tokio::time::timeout(Duration::from_secs(10), dispatcher.drain())
        .await
        .unwrap();
    assert_eq!(property.try_get().unwrap(), 200);
}

#[test]
fn concurrent_first_reads_seed_once() {
    let container = ScriptedContainer::new();
    let binding = inline_binding(container.clone());
    let property = Arc::new(Property::new(&binding, key("shared"), 11_i32));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let property = Arc::clone(&property);
            std::thread::spawn(move || property.get(no_error()))
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 11);
    }
    assert_eq!(container.sets(), 1);
}

proptest! {
    #[test]
    fn sum_merge_persists_running_total(increments in prop::collection::vec(-1000i32..1000, 1..20)) {
        let container = Arc::new(MemoryContainer::new());
        let property = Property::with_merge(&inline_binding(container), key("n"), 0, sum_merge());
        for inc in &increments {
            property.set(*inc, ignore(), no_error());
        }
        prop_assert_eq!(property.get(no_error()), increments.iter().sum::<i32>());
    }

    #[test]
    fn replace_merge_keeps_last_write(values in prop::collection::vec(any::<i64>(), 1..20)) {
        let container = Arc::new(MemoryContainer::new());
        let property = Property::new(&inline_binding(container), key("n"), 0_i64);
        for v in &values {
            property.set(*v, ignore(), no_error());
        }
        prop_assert_eq!(property.get(no_error()), *values.last().unwrap());
    }
}
