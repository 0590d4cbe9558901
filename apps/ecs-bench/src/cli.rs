use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run baseline component-read throughput test (>10M reads/sec/core)
    BaselineRead {
        /// Number of iterations to run
        #[arg(short, long, default_value_t = 100_000)]
        iterations: usize,

        /// Number of pre-populated entities
        #[arg(short, long, default_value_t = 1_000_000)]
        entity_count: usize,
    },

    /// Run component-insert throughput test (>1M writes/sec/core)
    WriteThroughput {
        /// Number of iterations to run
        #[arg(short, long, default_value_t = 10_000)]
        iterations: usize,
    },

    /// Run mixed read/write workload test
    MixedWorkload {
        /// Total operations to perform
        #[arg(short, long, default_value_t = 100_000)]
        operations: usize,

        /// Read percentage (0-100)
        #[arg(short, long, default_value_t = 80)]
        read_percent: u8,
    },

    /// Run frame-batch scaling test across worker thread counts (>90% efficiency)
    BatchScaling {
        /// Number of entities each run's batch systems operate over
        #[arg(short, long, default_value_t = 100_000)]
        entity_count: usize,

        /// Worker thread counts to test (comma-separated)
        #[arg(short, long, default_value = "1,2,4,8")]
        cores: String,
    },

    /// Run memory overhead test (<5% beyond raw component payload size)
    MemoryOverhead {
        /// Component payload sizes to test, in bytes (comma-separated)
        #[arg(long, default_value = "64,256,1024,4096")]
        payload_sizes: String,

        /// Entity counts to test (comma-separated)
        #[arg(long, default_value = "1000,5000,10000")]
        entity_counts: String,
    },

    /// Run concurrent-write contention test across disjoint entities
    CacheContention {
        /// Number of writer threads to test (comma-separated)
        #[arg(long, default_value = "1,2,4")]
        thread_counts: String,

        /// Operations per thread
        #[arg(long, default_value_t = 10_000)]
        operations: usize,
    },

    /// Run all performance regression tests
    All,
}
