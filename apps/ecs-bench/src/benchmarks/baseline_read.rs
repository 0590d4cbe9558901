use std::time::Instant;

use crate::utils::{populate_counters, Counter};

/// Run baseline component-read throughput test
pub fn run_baseline_read_test(iterations: usize, entity_count: usize) {
    println!("Running baseline read throughput test...");
    println!(
        "Iterations: {}, Pre-populated entities: {}",
        iterations, entity_count
    );

    if entity_count == 0 {
        eprintln!("Error: entity_count must be greater than 0");
        std::process::exit(1);
    }

    println!("Pre-populating {} entities...", entity_count);
    let start_populate = Instant::now();
    let (store, entities) = populate_counters(entity_count);
    println!("Pre-population complete in {:?}", start_populate.elapsed());

    println!("Starting read benchmark...");
    let start = Instant::now();

    for i in 0..iterations {
        let entity = entities[i % entities.len()];
        let result = store.with_component::<Counter, _>(entity, |c, _| c.0);
        let _ = std::hint::black_box(result);
    }

    let elapsed = start.elapsed();
    if elapsed > std::time::Duration::from_secs(30) {
        println!("Warning: test took longer than 30 seconds");
    }
    let reads_per_sec = if elapsed.as_secs_f64() == 0.0 {
        0.0
    } else {
        iterations as f64 / elapsed.as_secs_f64()
    };

    println!("Results:");
    println!("  Total time: {:?}", elapsed);
    println!("  Reads per second: {:.2}", reads_per_sec);
    println!("  Target: >10,000,000 reads/sec/core");

    if reads_per_sec > 10_000_000.0 {
        println!("  PASS: Baseline read throughput meets target");
    } else {
        println!("  FAIL: Baseline read throughput below target");
        println!(
            "     Performance: {:.2} reads/sec (target: >10M reads/sec/core)",
            reads_per_sec
        );
    }
}
