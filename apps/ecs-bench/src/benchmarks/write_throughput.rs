use std::time::Instant;

use ecs_core::config::EngineConfig;
use ecs_core::{EntityId, Store};

use crate::utils::Counter;

/// Run component-insert throughput test
pub fn run_write_throughput_test(iterations: usize) {
    println!("Running write throughput test...");
    println!("Iterations: {}", iterations);

    let store = Store::new(EngineConfig {
        initial_component_capacity: iterations.max(1),
        ..EngineConfig::default()
    });

    println!("Starting write benchmark...");
    let start = Instant::now();

    for i in 0..iterations {
        let entity = EntityId::new();
        let result = store.insert_component(entity, Counter(i as u64), &[]);
        let _ = std::hint::black_box(result);
    }

    let elapsed = start.elapsed();
    if elapsed > std::time::Duration::from_secs(30) {
        println!("Warning: test took longer than 30 seconds");
    }
    let writes_per_sec = if elapsed.as_secs_f64() == 0.0 {
        0.0
    } else {
        iterations as f64 / elapsed.as_secs_f64()
    };

    println!("Results:");
    println!("  Total time: {:?}", elapsed);
    println!("  Writes per second: {:.2}", writes_per_sec);
    println!("  Target: >1,000,000 writes/sec/core");

    if writes_per_sec > 1_000_000.0 {
        println!("  PASS: Write throughput meets target");
    } else {
        println!("  FAIL: Write throughput below target");
        println!(
            "     Performance: {:.2} writes/sec (target: >1M writes/sec/core)",
            writes_per_sec
        );
    }
}
