use ecs_core::config::EngineConfig;
use ecs_core::{EntityId, Store};

use crate::utils::{parse_comma_separated, Payload};

/// Run memory overhead test
pub fn run_memory_overhead_test(payload_sizes_str: &str, entity_counts_str: &str) {
    println!("Running memory overhead test...");
    println!("Target: <5% overhead beyond raw component payload size");
    println!("Payload sizes: {}", payload_sizes_str);
    println!("Entity counts: {}", entity_counts_str);

    if !cfg!(target_os = "linux") {
        println!("Skipped: RSS-delta measurement is only implemented for Linux (/proc/self/status).");
        return;
    }

    let payload_sizes = parse_comma_separated(payload_sizes_str);
    let entity_counts = parse_comma_separated(entity_counts_str);

    if payload_sizes.is_empty() || entity_counts.is_empty() {
        eprintln!("Error: No payload sizes or entity counts specified");
        std::process::exit(1);
    }
    for &size in &payload_sizes {
        if size == 0 {
            eprintln!("Error: Payload size must be greater than 0");
            std::process::exit(1);
        }
    }
    for &count in &entity_counts {
        if count == 0 {
            eprintln!("Error: Entity count must be greater than 0");
            std::process::exit(1);
        }
    }

    let mut all_results = Vec::new();
    let mut failed_tests = Vec::new();

    for &payload_size in &payload_sizes {
        for &entity_count in &entity_counts {
            println!(
                "\nTesting payload_size={}, entity_count={}",
                payload_size, entity_count
            );

            let store = Store::new(EngineConfig {
                initial_component_capacity: entity_count,
                ..EngineConfig::default()
            });

            let rss_before = read_rss_kb();

            println!("  Populating {} entities...", entity_count);
            for i in 0..entity_count {
                let entity = EntityId::new();
                let mut data = vec![0u8; payload_size];
                for (j, byte) in data.iter_mut().enumerate() {
                    *byte = ((i + j) % 256) as u8;
                }
                store
                    .insert_component(entity, Payload(data), &[])
                    .expect("failed to insert Payload component");
            }

            let rss_after = read_rss_kb();

            let raw_data_bytes = payload_size * entity_count;
            let rss_delta_bytes = rss_after.saturating_sub(rss_before) * 1024;
            let overhead_bytes = rss_delta_bytes.saturating_sub(raw_data_bytes);
            let overhead_percentage = if raw_data_bytes > 0 {
                (overhead_bytes as f64 / raw_data_bytes as f64) * 100.0
            } else {
                0.0
            };

            println!("  Results:");
            println!("    Raw data size: {} bytes", raw_data_bytes);
            println!("    RSS delta: {} bytes", rss_delta_bytes);
            println!(
                "    Overhead: {} bytes ({:.2}%)",
                overhead_bytes, overhead_percentage
            );

            let passed = overhead_percentage < 5.0;
            if passed {
                println!("    PASS: Overhead <5%");
            } else {
                println!("    FAIL: Overhead >=5% (target: <5%)");
                failed_tests.push((payload_size, entity_count, overhead_percentage));
            }
            all_results.push((payload_size, entity_count, overhead_percentage, passed));
        }
    }

    println!("\n{}", "=".repeat(60));
    println!("Memory Overhead Test Summary:");
    println!("{}", "-".repeat(60));

    for (payload_size, entity_count, overhead, passed) in &all_results {
        let status = if *passed { "PASS" } else { "FAIL" };
        println!(
            "  {}: payload={}, count={}, overhead={:.2}%",
            status, payload_size, entity_count, overhead
        );
    }

    if failed_tests.is_empty() {
        println!("\nALL TESTS PASSED: All memory overheads <5%");
    } else {
        println!("\nSOME TESTS FAILED:");
        for (size, count, overhead) in failed_tests {
            println!(
                "  payload={}, count={}, overhead={:.2}%",
                size, count, overhead
            );
        }
        std::process::exit(1);
    }
}

/// Reads the process's resident set size, in kilobytes, from `/proc/self/status`.
fn read_rss_kb() -> usize {
    let status = std::fs::read_to_string("/proc/self/status").unwrap_or_default();
    status
        .lines()
        .find(|line| line.starts_with("VmRSS:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}
