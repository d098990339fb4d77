//! Read and write throughput of properties over an in-memory container.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use propkeep_container::MemoryContainer;
use propkeep_property::{
    Binding, MutableListProperty, Property, SyncDomain, WriteDispatcher,
};
use propkeep_types::NamespacedKey;
use std::sync::Arc;
use std::thread;

fn binding(domain: SyncDomain) -> Binding {
    Binding {
        container: Arc::new(MemoryContainer::new()),
        domain: Arc::new(domain),
        dispatcher: Arc::new(WriteDispatcher::inline()),
    }
}

fn key(k: &str) -> NamespacedKey {
    NamespacedKey::new("bench", k).unwrap()
}

fn bench_scalar(c: &mut Criterion) {
    let binding = binding(SyncDomain::global());
    let counter = Property::with_merge(
        &binding,
        key("counter"),
        0_i64,
        Arc::new(|incoming: i64, previous: Option<i64>| previous.unwrap_or(0) + incoming),
    );
    counter.get(|_| {});

    c.bench_function("scalar_get_seeded", |b| {
        b.iter(|| black_box(counter.get(|_| {})))
    });

    c.bench_function("scalar_set_merged_inline", |b| {
        b.iter(|| counter.set(black_box(1), || {}, |_| {}))
    });
}

fn bench_list(c: &mut Criterion) {
    let binding = binding(SyncDomain::global());
    let mut group = c.benchmark_group("mutable_list_get");
    for len in [8_usize, 128, 1024] {
        let list = MutableListProperty::new(
            &binding,
            key(&format!("list{len}")),
            (0..len as i32).collect::<Vec<_>>(),
        );
        list.get(|_| {});
        group.bench_with_input(BenchmarkId::from_parameter(len), &list, |b, list| {
            b.iter(|| black_box(list.get(|_| {})))
        });
    }
    group.finish();
}

/// Four threads writing distinct keys, under one lock versus sixteen.
fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_set");
    group.sample_size(20);
    for shards in [1_usize, 16] {
        let binding = binding(SyncDomain::sharded(shards));
        let properties: Vec<_> = (0..4)
            .map(|t| Arc::new(Property::new(&binding, key(&format!("k{t}")), 0_i32)))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(shards), &properties, |b, properties| {
            b.iter(|| {
                let handles: Vec<_> = properties
                    .iter()
                    .map(|p| {
                        let p = Arc::clone(p);
                        thread::spawn(move || {
                            for i in 0..100 {
                                p.set(i, || {}, |_| {});
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scalar, bench_list, bench_contention);
criterion_main!(benches);
