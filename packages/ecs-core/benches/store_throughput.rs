//! Store component insert/query throughput benchmark.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ecs_core::config::EngineConfig;
use ecs_core::entity::EntityId;
use ecs_core::query::{Entity, Query};
use ecs_core::store::Store;
use std::any::Any;
use std::hint::black_box;

#[derive(Debug, Clone)]
struct Position {
    x: f32,
    y: f32,
}

impl ecs_core::component::Component for Position {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn populated_store(count: usize) -> (Store, Vec<EntityId>) {
    let store = Store::new(EngineConfig::default());
    let mut entities = Vec::with_capacity(count);
    for i in 0..count {
        let entity = EntityId::new();
        store
            .insert_component(
                entity,
                Position {
                    x: i as f32,
                    y: i as f32,
                },
                &[],
            )
            .unwrap();
        entities.push(entity);
    }
    (store, entities)
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_insert");
    for size in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let store = Store::new(EngineConfig::default());
                for i in 0..size {
                    let entity = EntityId::new();
                    store
                        .insert_component(entity, Position { x: i as f32, y: 0.0 }, &[])
                        .unwrap();
                }
                black_box(&store);
            });
        });
    }
    group.finish();
}

fn bench_query_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_query_stream");
    for size in [100usize, 1_000, 10_000] {
        let (store, _entities) = populated_store(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &store, |b, store| {
            b.iter(|| {
                let results = Query::<(Entity, Position)>::new(store).stream().unwrap();
                black_box(results);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_insert, bench_query_stream);
criterion_main!(benches);
