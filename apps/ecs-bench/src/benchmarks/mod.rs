pub mod baseline_read;
pub mod batch_scaling;
pub mod cache_contention;
pub mod memory_overhead;
pub mod mixed_workload;
pub mod write_throughput;
