use crate::metrics::{BenchmarkReport, IntervalStats, LatencyStats, ThroughputStats};
use crate::supervisor::SupervisorConfig;
use crate::utils::{format_latency_us, format_ops_rate, print_table_row, print_table_separator};
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Destination for a finished benchmark report
pub trait ReportSink {
    fn write_report(&mut self, report: &BenchmarkReport) -> Result<()>;

    /// Human-readable description of where the report goes
    fn destination(&self) -> String;
}

/// Serialization format of the results file
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Pretty-printed JSON document with run metadata
    Json,
    /// One row per interval plus an overall row
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "JSON"),
            OutputFormat::Csv => write!(f, "CSV"),
        }
    }
}

impl OutputFormat {
    /// Infer the format from the file extension, falling back to JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => OutputFormat::Csv,
            _ => OutputFormat::Json,
        }
    }
}

/// System information for reproducibility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub architecture: String,
    pub cpu_cores: usize,
    pub rust_version: String,
    pub benchmark_version: String,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_cores: crate::utils::get_cpu_cores(),
            rust_version: env!("CARGO_PKG_RUST_VERSION").to_string(),
            benchmark_version: crate::VERSION.to_string(),
        }
    }
}

/// Describes the run a report belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub version: String,
    pub run_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub target: String,
    pub backend: String,
    pub payload_size: usize,
    pub measure_interval_ms: u64,
    pub total_exec_time_ms: u64,
    pub capacity: usize,
    pub system_info: SystemInfo,
}

impl RunMetadata {
    pub fn new(target: &str, backend: &str, config: &SupervisorConfig) -> Self {
        Self {
            version: crate::VERSION.to_string(),
            run_id: crate::utils::generate_run_id(),
            timestamp: chrono::Utc::now(),
            target: target.to_string(),
            backend: backend.to_string(),
            payload_size: config.payload_size,
            measure_interval_ms: config.measure_interval.as_millis() as u64,
            total_exec_time_ms: config.total_exec_time.as_millis() as u64,
            capacity: config.capacity,
            system_info: SystemInfo::default(),
        }
    }
}

/// Layout of the JSON results file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub metadata: RunMetadata,
    pub report: BenchmarkReport,
}

/// Writes the report to a file in JSON or CSV
pub struct FileSink {
    path: PathBuf,
    format: OutputFormat,
    metadata: RunMetadata,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, format: OutputFormat, metadata: RunMetadata) -> Self {
        Self {
            path: path.into(),
            format,
            metadata,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn write_json(&self, report: &BenchmarkReport) -> Result<()> {
        let document = ReportDocument {
            metadata: self.metadata.clone(),
            report: report.clone(),
        };
        let json = serde_json::to_string_pretty(&document)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    fn write_csv(&self, report: &BenchmarkReport) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .from_path(&self.path)
            .with_context(|| format!("Failed to create {}", self.path.display()))?;

        // Column set comes from the overall latency block
        let percentiles: Vec<f64> = report
            .overall
            .latency
            .as_ref()
            .map(|l| l.percentiles.iter().map(|p| p.percentile).collect())
            .unwrap_or_default();

        let mut headers = vec![
            "label".to_string(),
            "interval".to_string(),
            "start_ms".to_string(),
            "duration_ms".to_string(),
            "operations".to_string(),
            "throughput_ops".to_string(),
            "mean_us".to_string(),
            "min_us".to_string(),
            "max_us".to_string(),
            "std_dev_us".to_string(),
        ];
        headers.extend(percentiles.iter().map(|p| format!("p{}_us", p)));
        writer.write_record(&headers)?;

        for interval in &report.intervals {
            writer.write_record(csv_record(
                &report.label,
                &interval.index.to_string(),
                interval.start_us,
                &interval.throughput,
                interval.latency.as_ref(),
                &percentiles,
            ))?;
        }

        let start_us = report.intervals.first().map_or(0, |i| i.start_us);
        writer.write_record(csv_record(
            &report.label,
            "overall",
            start_us,
            &report.overall.throughput,
            report.overall.latency.as_ref(),
            &percentiles,
        ))?;

        writer
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        Ok(())
    }
}

impl ReportSink for FileSink {
    fn write_report(&mut self, report: &BenchmarkReport) -> Result<()> {
        debug!("Writing {} report to {:?}", self.format, self.path);
        match self.format {
            OutputFormat::Json => self.write_json(report),
            OutputFormat::Csv => self.write_csv(report),
        }
    }

    fn destination(&self) -> String {
        self.path.display().to_string()
    }
}

fn csv_record(
    label: &str,
    interval: &str,
    start_us: u64,
    throughput: &ThroughputStats,
    latency: Option<&LatencyStats>,
    percentiles: &[f64],
) -> Vec<String> {
    let mut record = vec![
        label.to_string(),
        interval.to_string(),
        format!("{:.3}", start_us as f64 / 1000.0),
        format!("{:.3}", throughput.duration_us as f64 / 1000.0),
        throughput.operations.to_string(),
        format!("{:.2}", throughput.ops_per_second),
    ];

    match latency {
        Some(stats) => {
            record.push(format!("{:.3}", stats.mean_us));
            record.push(format!("{:.3}", stats.min_us));
            record.push(format!("{:.3}", stats.max_us));
            record.push(format!("{:.3}", stats.std_dev_us));
            for &p in percentiles {
                record.push(
                    stats
                        .percentile(p)
                        .map_or(String::new(), |v| format!("{:.3}", v)),
                );
            }
        }
        None => record.extend(std::iter::repeat(String::new()).take(4 + percentiles.len())),
    }

    record
}

/// Print the per-interval summary table to stdout
pub fn print_summary(report: &BenchmarkReport) {
    let widths = [10, 10, 16, 12, 12];

    println!();
    println!("{}", report.label);
    print_table_separator(&widths);
    print_table_row(&["Interval", "Writes", "Throughput", "Mean", "P99"], &widths);
    print_table_separator(&widths);

    for interval in &report.intervals {
        print_interval_row(&(interval.index + 1).to_string(), interval, &widths);
    }

    print_table_separator(&widths);
    let overall = &report.overall;
    let (mean, p99) = latency_columns(overall.latency.as_ref());
    print_table_row(
        &[
            "Overall",
            &overall.throughput.operations.to_string(),
            &format_ops_rate(overall.throughput.ops_per_second),
            &mean,
            &p99,
        ],
        &widths,
    );
    print_table_separator(&widths);
}

fn print_interval_row(name: &str, interval: &IntervalStats, widths: &[usize]) {
    let (mean, p99) = latency_columns(interval.latency.as_ref());
    print_table_row(
        &[
            name,
            &interval.throughput.operations.to_string(),
            &format_ops_rate(interval.throughput.ops_per_second),
            &mean,
            &p99,
        ],
        widths,
    );
}

fn latency_columns(latency: Option<&LatencyStats>) -> (String, String) {
    match latency {
        Some(stats) => (
            format_latency_us(stats.mean_us),
            stats
                .percentile(99.0)
                .map(format_latency_us)
                .unwrap_or_else(|| "-".to_string()),
        ),
        None => ("-".to_string(), "-".to_string()),
    }
}
