//! Benchmark: binding reads (cached vs invalidated) and factory lookups

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};
use trellis_core::{Completion, Datum, Factory, Getter, Registry, Store};

fn counter_store() -> Store {
    Store::new("bench", json!({ "count": 0, "items": { "a": 1, "b": 2, "c": 3 } }))
}

fn sum_getter(store: &Store) -> Getter {
    let get_items = store.getter(|s| s.get("items"));
    store.compose([get_items], |inputs| {
        let items = inputs[0].to_value()?;
        let sum: i64 = items
            .as_object()
            .map(|map| map.values().filter_map(Value::as_i64).sum())
            .unwrap_or(0);
        Ok(Datum::from(sum))
    })
}

fn benchmark_cached_read(c: &mut Criterion) {
    let registry = Registry::new();
    let store = counter_store();
    let sum = registry.bind(&sum_getter(&store)).unwrap();

    c.bench_function("cached_read", |b| {
        b.iter(|| black_box(sum.get().unwrap()));
    });
}

fn benchmark_invalidated_read(c: &mut Criterion) {
    let registry = Registry::new();
    let store = counter_store();
    let sum = registry.bind(&sum_getter(&store)).unwrap();
    let bump = store.define_action("bump", |store, _| {
        let count = store.state().get("count")?.as_i64().unwrap_or(0);
        store.state().set("count", count + 1)?;
        Ok(Completion::ready(Value::Null))
    });

    c.bench_function("invalidated_read", |b| {
        b.iter(|| {
            bump.call(vec![]).unwrap();
            black_box(sum.get().unwrap())
        });
    });
}

fn benchmark_factory_lookup(c: &mut Criterion) {
    let registry = Registry::new();
    let store = counter_store();
    let factory_store = store.clone();
    let by_key = Factory::new(move |args| {
        let key = args
            .value(0)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        factory_store.getter(move |s| s.get("items")?.get(&key))
    });

    c.bench_function("factory_cache_hit", |b| {
        b.iter(|| black_box(registry.bind_factory(&by_key, vec!["b".into()])));
    });

    c.bench_function("factory_uncached", |b| {
        b.iter(|| black_box(registry.bind_factory(&by_key, vec![json!({ "key": "b" }).into()])));
    });
}

criterion_group!(
    benches,
    benchmark_cached_read,
    benchmark_invalidated_read,
    benchmark_factory_lookup
);
criterion_main!(benches);
