//! Performance benchmarks for the ECS runtime.
//!
//! CLI tool for running performance regression tests:
//! - Baseline component-read throughput: >10M reads/sec/core
//! - Component-insert throughput: >1M writes/sec/core
//! - Mixed read/write workload latency
//! - Frame-batch scaling across worker-thread counts
//! - Memory overhead of component storage
//! - Concurrent-write contention across disjoint entities

mod benchmarks;
mod cli;
mod utils;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::BaselineRead {
            iterations,
            entity_count,
        } => {
            if entity_count == 0 {
                eprintln!("Error: entity_count must be greater than 0");
                std::process::exit(1);
            }
            benchmarks::baseline_read::run_baseline_read_test(iterations, entity_count);
        }
        Commands::WriteThroughput { iterations } => {
            benchmarks::write_throughput::run_write_throughput_test(iterations);
        }
        Commands::MixedWorkload {
            operations,
            read_percent,
        } => {
            if read_percent > 100 {
                eprintln!("Error: read_percent must be between 0 and 100");
                std::process::exit(1);
            }
            if operations == 0 {
                eprintln!("Error: operations must be greater than 0");
                std::process::exit(1);
            }
            benchmarks::mixed_workload::run_mixed_workload_test(operations, read_percent);
        }
        Commands::BatchScaling {
            entity_count,
            cores,
        } => {
            if entity_count == 0 {
                eprintln!("Error: entity_count must be greater than 0");
                std::process::exit(1);
            }
            benchmarks::batch_scaling::run_batch_scaling_test(entity_count, &cores);
        }
        Commands::MemoryOverhead {
            payload_sizes,
            entity_counts,
        } => {
            benchmarks::memory_overhead::run_memory_overhead_test(&payload_sizes, &entity_counts);
        }
        Commands::CacheContention {
            thread_counts,
            operations,
        } => {
            benchmarks::cache_contention::run_cache_contention_test(&thread_counts, operations);
        }
        Commands::All => {
            utils::run_all_benchmarks();
        }
    }
}
