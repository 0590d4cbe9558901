use std::any::Any;

use ecs_core::component::Component;
use ecs_core::config::EngineConfig;
use ecs_core::{EntityId, Store};

/// A single `u64` payload, the ECS analogue of the teacher's fixed-width
/// benchmark record.
#[derive(Debug, Clone, Copy)]
pub struct Counter(pub u64);

impl Component for Counter {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A variable-size payload used by the memory overhead benchmark.
#[derive(Debug, Clone)]
pub struct Payload(pub Vec<u8>);

impl Component for Payload {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Builds a `Store` pre-populated with `count` entities, each carrying a
/// `Counter` component seeded with its index.
pub fn populate_counters(count: usize) -> (Store, Vec<EntityId>) {
    let store = Store::new(EngineConfig {
        initial_component_capacity: count.max(1),
        ..EngineConfig::default()
    });
    let mut entities = Vec::with_capacity(count);
    for i in 0..count {
        let entity = EntityId::new();
        store
            .insert_component(entity, Counter(i as u64), &[])
            .expect("failed to insert Counter component");
        entities.push(entity);
    }
    (store, entities)
}

/// Parse comma-separated string into vector of usize
pub fn parse_comma_separated(input: &str) -> Vec<usize> {
    input
        .split(',')
        .map(|s| {
            s.trim()
                .parse()
                .expect("Invalid value: must be positive integer")
        })
        .collect()
}

/// Run all performance regression tests
pub fn run_all_benchmarks() {
    use crate::benchmarks;

    println!("Running all performance regression tests...");
    println!("{}", "=".repeat(60));

    println!("\n1. Baseline Read Throughput Test");
    println!("{}", "-".repeat(40));
    benchmarks::baseline_read::run_baseline_read_test(100_000, 1_000_000);

    println!("\n2. Write Throughput Test");
    println!("{}", "-".repeat(40));
    benchmarks::write_throughput::run_write_throughput_test(10_000);

    println!("\n3. Mixed Workload Test");
    println!("{}", "-".repeat(40));
    benchmarks::mixed_workload::run_mixed_workload_test(100_000, 80);

    println!("\n4. Batch Scaling Test");
    println!("{}", "-".repeat(40));
    benchmarks::batch_scaling::run_batch_scaling_test(100_000, "1,2,4,8");

    println!("\n5. Memory Overhead Test");
    println!("{}", "-".repeat(40));
    benchmarks::memory_overhead::run_memory_overhead_test("64,256,1024,4096", "1000,5000,10000");

    println!("\n6. Cache Contention Test");
    println!("{}", "-".repeat(40));
    benchmarks::cache_contention::run_cache_contention_test("1,2,4", 10_000);

    println!("\n{}", "=".repeat(60));
    println!("All tests completed.");
}
