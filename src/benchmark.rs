//! # Benchmark Engine Module
//!
//! Glue between the command line and the measurement core. A
//! [`BenchmarkRunner`] takes a validated [`BenchmarkConfig`] through one
//! complete run:
//!
//! 1. **Connect**: open the backend connection to the target
//! 2. **Measure**: hand the backend to the [`Supervisor`], which drives the
//!    worker and records checkpoints
//! 3. **Aggregate**: summarize the samples and write the results file
//! 4. **Report**: print the per-interval summary table
//!
//! Connection and configuration problems surface as [`RunError::Setup`];
//! anything that invalidates the measurement is a [`RunError::Fatal`]. A
//! results file that cannot be written is not an error: the run still
//! completes and the outcome is reported in [`RunOutcome::sink`].

use crate::{
    aggregator::{ResultAggregator, SinkOutcome},
    backend::{BackendConfig, TcpBackend, WriteBackend},
    cli::Args,
    error::RunError,
    metrics::BenchmarkReport,
    results::{print_summary, FileSink, OutputFormat, RunMetadata},
    supervisor::{Supervisor, SupervisorConfig},
    utils::{
        format_duration, validate_capacity, validate_payload_size, validate_percentiles,
        validate_timing,
    },
};
use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// A helper struct to provide a consistent, single source of truth for displaying
/// the benchmark configuration.
struct BenchmarkConfigDisplay<'a> {
    config: &'a BenchmarkConfig,
    planned_intervals: u64,
}

impl<'a> std::fmt::Display for BenchmarkConfigDisplay<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let config = self.config;
        writeln!(
            f,
            "-----------------------------------------------------------------"
        )?;
        writeln!(f, "Starting Benchmark: {}", config.label)?;
        writeln!(f, "  Target:             {}", config.target)?;
        writeln!(f, "  Payload Size:       {} bytes", config.payload_size)?;
        writeln!(
            f,
            "  Interval:           {}",
            format_duration(config.measure_interval)
        )?;
        writeln!(
            f,
            "  Total Time:         {} ({} intervals)",
            format_duration(config.total_exec_time),
            self.planned_intervals
        )?;
        writeln!(f, "  Recorder Capacity:  {} samples", config.capacity)?;
        let affinity_str = config
            .worker_affinity
            .map_or("Not set".to_string(), |c| c.to_string());
        writeln!(f, "  Worker Affinity:    {}", affinity_str)?;
        let timeout_str = config
            .io_timeout
            .map_or("None".to_string(), format_duration);
        writeln!(f, "  I/O Timeout:        {}", timeout_str)?;
        writeln!(
            f,
            "  Output:             {} ({})",
            config.output_file.display(),
            config.output_format
        )?;
        write!(
            f,
            "-----------------------------------------------------------------"
        )
    }
}

/// Configuration for one benchmark run
#[derive(Clone, Debug)]
pub struct BenchmarkConfig {
    /// Size of each write's payload in bytes
    pub payload_size: usize,

    /// Time between checkpoints
    pub measure_interval: Duration,

    /// Run time, rounded up to a whole number of intervals
    pub total_exec_time: Duration,

    /// `host:port` of the system under test
    pub target: String,

    pub output_file: PathBuf,
    pub output_format: OutputFormat,

    /// Number of latency samples the recorder can hold
    pub capacity: usize,

    pub label: String,
    pub percentiles: Vec<f64>,
    pub worker_affinity: Option<usize>,
    pub connect_timeout: Option<Duration>,
    pub io_timeout: Option<Duration>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        let output_file = PathBuf::from(crate::defaults::OUTPUT_FILE);
        Self {
            payload_size: crate::defaults::PAYLOAD_SIZE,
            measure_interval: crate::defaults::MEASURE_INTERVAL,
            total_exec_time: crate::defaults::TOTAL_EXEC_TIME,
            target: crate::defaults::TARGET.to_string(),
            output_format: OutputFormat::from_path(&output_file),
            output_file,
            capacity: crate::defaults::RECORDER_CAPACITY,
            label: crate::defaults::LABEL.to_string(),
            percentiles: crate::defaults::PERCENTILES.to_vec(),
            worker_affinity: None,
            connect_timeout: None,
            io_timeout: None,
        }
    }
}

impl BenchmarkConfig {
    /// Create and validate a benchmark configuration from CLI arguments
    pub fn from_args(args: &Args) -> Result<Self> {
        let config = Self {
            payload_size: args.payload_size,
            measure_interval: args.interval,
            total_exec_time: args.total_time,
            target: args.target.clone(),
            output_file: args.output_file.clone(),
            output_format: args.output_format(),
            capacity: args.capacity,
            label: args.label.clone(),
            percentiles: args.percentiles.clone(),
            worker_affinity: args.worker_affinity,
            connect_timeout: args.connect_timeout,
            io_timeout: args.io_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_payload_size(self.payload_size)?;
        validate_timing(self.measure_interval, self.total_exec_time)?;
        validate_capacity(self.capacity)?;
        validate_percentiles(&self.percentiles)?;
        Ok(())
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            measure_interval: self.measure_interval,
            total_exec_time: self.total_exec_time,
            capacity: self.capacity,
            payload_size: self.payload_size,
            worker_affinity: self.worker_affinity,
        }
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            target: self.target.clone(),
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
        }
    }
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: BenchmarkReport,
    /// Whether the results file was written
    pub sink: SinkOutcome,
    /// Writes completed by the worker
    pub operations: u64,
}

/// Benchmark runner that drives one measurement run end to end
pub struct BenchmarkRunner {
    config: BenchmarkConfig,
}

impl BenchmarkRunner {
    pub fn new(config: BenchmarkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Connect to the configured target over TCP and run the benchmark
    pub fn run(&self) -> Result<RunOutcome, RunError> {
        info!("Connecting to {}", self.config.target);
        let backend = TcpBackend::connect(&self.config.backend_config())?;
        debug!("Connected to {}", backend.peer_addr());

        self.run_with_backend(backend)
    }

    /// Run the benchmark against an already-connected backend
    pub fn run_with_backend<B: WriteBackend>(&self, backend: B) -> Result<RunOutcome, RunError> {
        let supervisor = Supervisor::new(self.config.supervisor_config());
        info!(
            "\n{}",
            BenchmarkConfigDisplay {
                config: &self.config,
                planned_intervals: supervisor.planned_intervals(),
            }
        );

        let metadata = RunMetadata::new(&self.config.target, backend.name(), supervisor.config());
        let data = supervisor.run(backend)?;
        info!(
            "Measurement finished: {} writes, {} checkpoints",
            data.operations,
            data.checkpoints.len()
        );

        let mut sink = FileSink::new(
            self.config.output_file.clone(),
            self.config.output_format,
            metadata,
        );
        let aggregator = ResultAggregator::new(self.config.percentiles.clone());
        let (report, outcome) =
            aggregator.aggregate(&data.samples, &data.checkpoints, &mut sink, &self.config.label)?;

        print_summary(&report);

        Ok(RunOutcome {
            report,
            sink: outcome,
            operations: data.operations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BackendError, FatalBenchmarkError};
    use clap::Parser;
    use tempfile::TempDir;

    fn quick_config(dir: &TempDir, file: &str) -> BenchmarkConfig {
        let output_file = dir.path().join(file);
        BenchmarkConfig {
            measure_interval: Duration::from_millis(10),
            total_exec_time: Duration::from_millis(30),
            capacity: 1 << 20,
            payload_size: 64,
            output_format: OutputFormat::from_path(&output_file),
            output_file,
            ..BenchmarkConfig::default()
        }
    }

    fn paced(_: u64, _: &[u8]) -> Result<(), BackendError> {
        std::thread::sleep(Duration::from_micros(100));
        Ok(())
    }

    #[test]
    fn test_config_from_args() {
        let args = Args::try_parse_from([
            "write-latency-bench",
            "-i",
            "500ms",
            "-t",
            "5s",
            "-m",
            "128",
            "-o",
            "run.csv",
            "--label",
            "nightly",
        ])
        .unwrap();

        let config = BenchmarkConfig::from_args(&args).unwrap();
        assert_eq!(config.measure_interval, Duration::from_millis(500));
        assert_eq!(config.total_exec_time, Duration::from_secs(5));
        assert_eq!(config.payload_size, 128);
        assert_eq!(config.output_format, OutputFormat::Csv);
        assert_eq!(config.label, "nightly");

        let supervisor = config.supervisor_config();
        assert_eq!(supervisor.payload_size, 128);
        assert_eq!(supervisor.capacity, crate::defaults::RECORDER_CAPACITY);
        assert_eq!(config.backend_config().target, crate::defaults::TARGET);
    }

    #[test]
    fn test_config_validation_rejects_bad_values() {
        let bad_payload = Args::try_parse_from(["write-latency-bench", "-m", "0"]).unwrap();
        assert!(BenchmarkConfig::from_args(&bad_payload).is_err());

        let bad_interval = Args::try_parse_from(["write-latency-bench", "-i", "0"]).unwrap();
        assert!(BenchmarkConfig::from_args(&bad_interval).is_err());

        let bad_capacity = Args::try_parse_from(["write-latency-bench", "--capacity", "0"]).unwrap();
        assert!(BenchmarkConfig::from_args(&bad_capacity).is_err());

        let too_many_intervals =
            Args::try_parse_from(["write-latency-bench", "-i", "1ms", "-t", "100000h"]).unwrap();
        assert!(BenchmarkConfig::from_args(&too_many_intervals).is_err());

        let bad_percentile =
            Args::try_parse_from(["write-latency-bench", "--percentiles", "50,101"]).unwrap();
        assert!(BenchmarkConfig::from_args(&bad_percentile).is_err());
    }

    #[test]
    fn test_config_display_lists_settings() {
        let config = BenchmarkConfig::default();
        let text = BenchmarkConfigDisplay {
            config: &config,
            planned_intervals: 5,
        }
        .to_string();

        assert!(text.contains("Write Latency Benchmark"));
        assert!(text.contains("2048 bytes"));
        assert!(text.contains("(5 intervals)"));
        assert!(text.contains("Not set"));
    }

    #[test]
    fn test_run_with_backend_writes_results() {
        let dir = TempDir::new().unwrap();
        let runner = BenchmarkRunner::new(quick_config(&dir, "results.json"));

        let outcome = runner.run_with_backend(paced).unwrap();

        assert!(outcome.sink.is_written());
        assert_eq!(outcome.report.intervals.len(), 3);
        assert!(outcome.operations > 0);
        assert!(dir.path().join("results.json").exists());
    }

    #[test]
    fn test_unwritable_output_still_completes() {
        let dir = TempDir::new().unwrap();
        let runner = BenchmarkRunner::new(quick_config(&dir, "missing/results.json"));

        let outcome = runner.run_with_backend(paced).unwrap();

        assert!(!outcome.sink.is_written());
        assert_eq!(outcome.report.intervals.len(), 3);
    }

    #[test]
    fn test_backend_failure_maps_to_fatal() {
        let dir = TempDir::new().unwrap();
        let runner = BenchmarkRunner::new(quick_config(&dir, "results.json"));

        let err = runner
            .run_with_backend(|_: u64, _: &[u8]| -> Result<(), BackendError> {
                Err(BackendError::Disconnected)
            })
            .unwrap_err();

        assert!(matches!(
            err,
            RunError::Fatal(FatalBenchmarkError::BackendFailure { record_id: 0, .. })
        ));
        assert_eq!(err.exit_code(), 2);
        assert!(!dir.path().join("results.json").exists());
    }

    #[test]
    fn test_connection_refused_is_setup_error() {
        // Bind then drop to get a port nothing listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let dir = TempDir::new().unwrap();
        let config = BenchmarkConfig {
            target: format!("127.0.0.1:{}", port),
            connect_timeout: Some(Duration::from_millis(500)),
            ..quick_config(&dir, "results.json")
        };

        let err = BenchmarkRunner::new(config).run().unwrap_err();
        assert!(matches!(err, RunError::Setup(_)));
        assert_eq!(err.exit_code(), 1);
    }
}
