use std::sync::Arc;
use std::time::{Duration, Instant};

use ecs_core::Store;
use ecs_runtime::{FnSystem, Scheduler, Setup};

use crate::utils::{populate_counters, Counter};

const SYSTEM_COUNT: usize = 8;

/// Run frame-batch scaling test across tokio worker-thread counts
pub fn run_batch_scaling_test(entity_count: usize, cores_str: &str) {
    println!("Running batch scaling test...");
    println!(
        "Entity count: {}, Worker thread counts: {}",
        entity_count, cores_str
    );

    let mut core_counts: Vec<usize> = cores_str
        .split(',')
        .map(|s| {
            s.trim()
                .parse()
                .expect("Invalid worker thread count: must be positive integer")
        })
        .collect();

    if core_counts.is_empty() {
        eprintln!("Error: No worker thread counts specified");
        std::process::exit(1);
    }
    for &cores in &core_counts {
        if cores == 0 {
            eprintln!("Error: worker thread count must be greater than 0");
            std::process::exit(1);
        }
    }
    if !core_counts.contains(&1) {
        eprintln!("Error: worker thread counts must include 1 for baseline measurement");
        eprintln!("Please include '1' in the core counts list (e.g., '1,2,4')");
        std::process::exit(1);
    }
    core_counts.sort();

    let mut results = Vec::new();
    let mut base_time = Duration::default();

    for &cores in &core_counts {
        println!("\nTesting with {} worker thread(s):", cores);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(cores)
            .enable_time()
            .build()
            .expect("failed to build tokio runtime");

        let elapsed = runtime.block_on(async {
            let (store, _entities) = populate_counters(entity_count);
            let mut scheduler = build_scheduler(Arc::new(store), entity_count);
            scheduler.run_startup().await.expect("startup failed");

            let start = Instant::now();
            scheduler.run_frame().await.expect("frame failed");
            start.elapsed()
        });

        if cores == 1 {
            base_time = elapsed;
        }
        let expected = if cores == 1 {
            elapsed
        } else {
            base_time / cores as u32
        };
        let efficiency = if cores == 1 {
            100.0
        } else {
            let actual = elapsed.as_secs_f64();
            let exp = expected.as_secs_f64();
            if actual == 0.0 || exp == 0.0 {
                0.0
            } else {
                (exp / actual) * 100.0
            }
        };

        results.push((cores, elapsed, efficiency));
        println!("  Frame time: {:?}, Efficiency: {:.1}%", elapsed, efficiency);
    }

    println!("\n{}", "=".repeat(60));
    println!("Batch Scaling Test Results:");
    println!("{}", "-".repeat(60));
    for (cores, time, efficiency) in &results {
        println!(
            "  {} worker(s): {:?} (efficiency: {:.1}%)",
            cores, time, efficiency
        );
    }

    let all_pass = results
        .iter()
        .skip(1)
        .all(|(_, _, efficiency)| *efficiency > 90.0);

    if all_pass {
        println!("\nPASS: All scaling efficiencies >90%");
    } else {
        println!("\nFAIL: Some scaling efficiencies <=90%");
        for (cores, _, efficiency) in &results {
            if *cores > 1 && *efficiency <= 90.0 {
                println!(
                    "  {} worker(s) efficiency: {:.1}% (expected >90%)",
                    cores, efficiency
                );
            }
        }
    }
}

/// Registers `SYSTEM_COUNT` CPU-bound batch systems, each summing one shard
/// of the populated `Counter` components. None of them lock any component
/// type, so the placement algorithm packs them all into a single batch and
/// the frame loop's `JoinSet` runs them concurrently.
fn build_scheduler(store: Arc<Store>, entity_count: usize) -> Scheduler {
    let shard = (entity_count.max(SYSTEM_COUNT)) / SYSTEM_COUNT;
    let mut setup = Setup::new(store);

    for i in 0..SYSTEM_COUNT {
        let name: &'static str = Box::leak(format!("batch-scaling-{i}").into_boxed_str());
        let start = i * shard;
        let end = start + shard;
        let system = FnSystem::new(name, move |store| async move {
            let entities = store.entities_with::<Counter>();
            let mut sum = 0u64;
            for entity in entities.iter().skip(start).take(end.saturating_sub(start)) {
                if let Some(value) = store.with_component::<Counter, _>(*entity, |c, _| c.0) {
                    sum = sum.wrapping_add(value);
                }
            }
            let _ = std::hint::black_box(sum);
            Ok(())
        })
        .into_arc();
        setup = setup
            .add_system(system)
            .expect("failed to register batch-scaling system");
    }

    setup.build()
}
