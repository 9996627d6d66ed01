//! # Write Latency Benchmark Library
//!
//! A closed-loop write benchmark: a single worker thread issues one write at a
//! time against a target system and records how long each write took, while a
//! supervisor takes a checkpoint of the progress at every measurement
//! interval. After the run, the samples are bucketed by checkpoint into
//! per-interval throughput and latency statistics.
//!
//! ## Architecture Overview
//!
//! The library is organized into several key modules:
//!
//! - `recorder`: Pre-allocated, append-only store for latency samples
//! - `worker`: The closed write loop
//! - `supervisor`: Run lifecycle, interval checkpoints, stop and join
//! - `aggregator`: Turns samples and checkpoints into a report
//! - `backend`: The write capability, its TCP client and a reference server
//! - `results`: Report sinks (JSON and CSV files) and the console summary
//! - `benchmark`: Configuration and the end-to-end runner used by the binary
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use write_latency_bench::{BenchmarkConfig, BenchmarkRunner};
//! use std::time::Duration;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = BenchmarkConfig {
//!         target: "127.0.0.1:21212".to_string(),
//!         measure_interval: Duration::from_secs(1),
//!         total_exec_time: Duration::from_secs(5),
//!         ..BenchmarkConfig::default()
//!     };
//!
//!     let outcome = BenchmarkRunner::new(config).run()?;
//!     println!(
//!         "Overall throughput: {:.0} writes/s",
//!         outcome.report.overall.throughput.ops_per_second
//!     );
//!     Ok(())
//! }
//! ```
//!
//! Any type implementing [`WriteBackend`] can be measured, including plain
//! closures:
//!
//! ```rust
//! use write_latency_bench::{BackendError, Supervisor, SupervisorConfig};
//! use std::time::Duration;
//!
//! let supervisor = Supervisor::new(SupervisorConfig {
//!     measure_interval: Duration::from_millis(5),
//!     total_exec_time: Duration::from_millis(10),
//!     capacity: 1 << 20,
//!     ..SupervisorConfig::default()
//! });
//! let data = supervisor
//!     .run(|_id: u64, _payload: &[u8]| -> Result<(), BackendError> { Ok(()) })
//!     .unwrap();
//! assert_eq!(data.checkpoints.len(), 3);
//! ```

/// Result aggregation
///
/// Validates the checkpoint sequence and computes per-interval and overall
/// throughput and latency statistics, then hands the report to a sink.
pub mod aggregator;

/// Write backends
///
/// The `WriteBackend` trait, the length-prefixed bincode wire protocol, the
/// blocking TCP client and the tokio reference server.
pub mod backend;

/// Benchmark configuration and the end-to-end runner
pub mod benchmark;

/// Command-line interface
///
/// Argument parsing using clap, including human-readable durations
/// (e.g., "500ms", "2s").
pub mod cli;

pub mod error;

pub mod logging;

/// Report and statistics types, plus the latency histogram
pub mod metrics;

/// Latency sample storage
pub mod recorder;

/// Report sinks, run metadata and console output
pub mod results;

/// Run lifecycle and interval checkpoints
pub mod supervisor;

pub mod utils;

pub mod worker;

pub use aggregator::{ResultAggregator, SinkOutcome};
pub use backend::{BackendConfig, ReferenceServer, ServerConfig, TcpBackend, WriteBackend};
pub use benchmark::{BenchmarkConfig, BenchmarkRunner, RunOutcome};
pub use cli::Args;
pub use error::{BackendError, FatalBenchmarkError, RunError};
pub use metrics::{BenchmarkReport, IntervalStats, LatencyStats, OverallStats, ThroughputStats};
pub use recorder::LatencyRecorder;
pub use results::{FileSink, OutputFormat, ReportSink};
pub use supervisor::{Checkpoint, RunData, Supervisor, SupervisorConfig};
pub use worker::Worker;

/// The current version of the benchmark
///
/// Populated from Cargo.toml and written into every results file.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    /// Default payload size of each write in bytes
    pub const PAYLOAD_SIZE: usize = 2048;

    /// Default time between checkpoints
    pub const MEASURE_INTERVAL: Duration = Duration::from_millis(2000);

    /// Default total run time
    ///
    /// Checked only at interval boundaries, so the effective run time is
    /// this value rounded up to a whole number of intervals.
    pub const TOTAL_EXEC_TIME: Duration = Duration::from_millis(10000);

    /// Default number of latency sample slots (64M, 512 MiB of memory)
    pub const RECORDER_CAPACITY: usize = 1 << 26;

    /// Default target address
    pub const TARGET: &str = "127.0.0.1:21212";

    /// Default output file name
    pub const OUTPUT_FILE: &str = "write_bench_results.json";

    /// Default report label
    pub const LABEL: &str = "Write Latency Benchmark";

    /// Default latency percentiles
    pub const PERCENTILES: &[f64] = &[50.0, 90.0, 95.0, 99.0, 99.9];

    /// Largest payload the reference server accepts
    pub const SERVER_MAX_PAYLOAD: usize = 1024 * 1024;

    /// Most measurement intervals a single run may plan
    pub const MAX_INTERVALS: u64 = 1_000_000;
}
