use std::sync::Arc;
use std::thread;
use std::time::Instant;

use ecs_core::config::EngineConfig;
use ecs_core::{EntityId, Store};

use crate::utils::{parse_comma_separated, Counter};

/// Run concurrent-write contention test. Each thread repeatedly updates a
/// component on its own entity, so the workload has no logical write
/// conflicts; this isolates how much the `Store`'s sharded `DashMap` storage
/// degrades as writer thread count grows.
pub fn run_cache_contention_test(thread_counts_str: &str, operations: usize) {
    println!("Running concurrent-write contention test...");
    println!("Thread counts: {}", thread_counts_str);
    println!("Operations per thread: {}", operations);

    if operations == 0 {
        eprintln!("Error: operations must be greater than 0");
        std::process::exit(1);
    }

    let thread_counts = parse_comma_separated(thread_counts_str);
    if thread_counts.is_empty() {
        eprintln!("Error: No thread counts specified");
        std::process::exit(1);
    }
    for &count in &thread_counts {
        if count == 0 {
            eprintln!("Error: Thread count must be greater than 0");
            std::process::exit(1);
        }
    }

    let mut results = Vec::new();
    let mut base_ops_per_sec = 0.0;

    for &thread_count in &thread_counts {
        println!("\nTesting thread_count={}", thread_count);

        let store = Arc::new(Store::new(EngineConfig {
            initial_component_capacity: thread_count,
            ..EngineConfig::default()
        }));

        let owned_entities: Vec<EntityId> = (0..thread_count)
            .map(|i| {
                let entity = EntityId::new();
                store
                    .insert_component(entity, Counter(i as u64), &[])
                    .expect("failed to insert Counter component");
                entity
            })
            .collect();

        println!("  Starting benchmark with {} threads...", thread_count);
        let start = Instant::now();

        let handles: Vec<_> = owned_entities
            .iter()
            .copied()
            .map(|entity| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..operations {
                        store
                            .update_component(entity, Counter(i as u64))
                            .expect("failed to update Counter component");
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("writer thread panicked");
        }

        let elapsed = start.elapsed();
        let total_operations = operations * thread_count;
        let ops_per_sec = total_operations as f64 / elapsed.as_secs_f64();

        println!("  Results:");
        println!("    Total time: {:?}", elapsed);
        println!("    Total operations: {}", total_operations);
        println!("    Operations per second: {:.2}", ops_per_sec);

        if thread_count == 1 {
            base_ops_per_sec = ops_per_sec;
        }
        results.push((thread_count, ops_per_sec));
    }

    println!("\n{}", "=".repeat(60));
    println!("Contention Scaling Summary:");
    println!("{}", "-".repeat(60));

    let mut has_poor_scaling = false;
    for (thread_count, ops_per_sec) in &results {
        let efficiency = if base_ops_per_sec == 0.0 || *thread_count == 1 {
            100.0
        } else {
            (ops_per_sec / (base_ops_per_sec * *thread_count as f64)) * 100.0
        };
        println!(
            "  {} thread(s): {:.2} ops/sec (efficiency vs. linear: {:.1}%)",
            thread_count, ops_per_sec, efficiency
        );
        if *thread_count > 1 && efficiency < 50.0 {
            has_poor_scaling = true;
        }
    }

    if has_poor_scaling {
        println!("\nFAIL: Write throughput degrades sharply under concurrency");
        std::process::exit(1);
    } else {
        println!("\nPASS: Write throughput scales acceptably under concurrency");
    }
}
