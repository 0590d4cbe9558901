use std::time::Instant;

use ecs_core::EntityId;

use crate::utils::{populate_counters, Counter};

/// Run mixed read/write workload test
pub fn run_mixed_workload_test(operations: usize, read_percent: u8) {
    println!("Running mixed workload test...");
    println!(
        "Total operations: {}, Read percentage: {}%",
        operations, read_percent
    );

    if operations == 0 {
        println!("No operations to perform, test skipped.");
        return;
    }

    let pre_populate_count = operations / 2;
    println!("Pre-populating {} entities...", pre_populate_count);

    if pre_populate_count == 0 {
        println!(
            "Warning: No entities pre-populated for reading (operations={})",
            operations
        );
    }

    let (store, entities) = populate_counters(pre_populate_count);

    println!("Starting mixed workload benchmark...");
    let start = Instant::now();

    let mut read_ops = (operations as f64 * (read_percent as f64 / 100.0)) as usize;
    if pre_populate_count == 0 && read_ops > 0 {
        println!(
            "Warning: Cannot perform reads with no pre-populated entities, setting read_ops to 0"
        );
        read_ops = 0;
    }
    let write_ops = operations - read_ops;

    let mut reads_done = 0;
    let mut writes_done = 0;

    for i in 0..operations {
        if i % 100 < read_percent as usize && reads_done < read_ops {
            let entity = entities[i % entities.len()];
            let result = store.with_component::<Counter, _>(entity, |c, _| c.0);
            let _ = std::hint::black_box(result);
            reads_done += 1;
        } else if writes_done < write_ops {
            let entity = EntityId::new();
            let result = store.insert_component(entity, Counter((pre_populate_count + writes_done) as u64), &[]);
            let _ = std::hint::black_box(result);
            writes_done += 1;
        }
    }

    let elapsed = start.elapsed();
    if elapsed > std::time::Duration::from_secs(30) {
        println!("Warning: test took longer than 30 seconds");
    }
    let ops_per_sec = if elapsed.as_secs_f64() == 0.0 {
        0.0
    } else {
        operations as f64 / elapsed.as_secs_f64()
    };

    println!("Results:");
    println!("  Total time: {:?}", elapsed);
    println!("  Operations per second: {:.2}", ops_per_sec);
    println!("  Reads performed: {}", reads_done);
    println!("  Writes performed: {}", writes_done);
}
