//! # Utility Functions and Helper Module
//!
//! Helpers shared by the harness: human-readable formatting, statistics over
//! raw latency samples, input validation, system information and thread
//! placement.
//!
//! ## Key Functionality Categories
//!
//! - **Formatting**: Human-readable display of durations and operation rates
//! - **Statistics**: Mean, extremes, standard deviation and percentiles
//! - **Validation**: Input parameter validation with clear error messages
//! - **System Information**: CPU detection and core pinning
//! - **Display Helpers**: Table formatting for the console summary
//!
//! ## Usage Examples
//!
//! ```rust
//! use write_latency_bench::utils::*;
//! use std::time::Duration;
//!
//! let duration_str = format_duration(Duration::from_micros(1500));
//! assert_eq!(duration_str, "1.50ms");
//!
//! let rate_str = format_ops_rate(15500.0);
//! assert_eq!(rate_str, "15.50K ops/s");
//!
//! # fn main() -> anyhow::Result<()> {
//! validate_payload_size(2048)?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Generate a unique identifier for a benchmark run
///
/// Creates a UUID v4 string used in report metadata so that result files
/// from repeated runs can be told apart.
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Format a duration in a human-readable way
///
/// Automatically selects the most appropriate unit based on the magnitude.
///
/// ## Unit Selection Logic
///
/// - **Nanoseconds**: < 1,000 ns (e.g., "500ns")
/// - **Microseconds**: < 1,000,000 ns (e.g., "1.50μs")
/// - **Milliseconds**: < 1,000,000,000 ns (e.g., "25.75ms")
/// - **Seconds**: < 60 seconds (e.g., "5.25s")
/// - **Minutes and Hours**: For longer durations (e.g., "5m 30s", "2h 15m 30s")
///
/// ## Examples
///
/// ```rust
/// # use write_latency_bench::utils::format_duration;
/// # use std::time::Duration;
/// assert_eq!(format_duration(Duration::from_nanos(750)), "750ns");
/// assert_eq!(format_duration(Duration::from_nanos(1250)), "1.25μs");
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.50ms");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ns = duration.as_nanos();

    if total_ns < 1_000 {
        format!("{}ns", total_ns)
    } else if total_ns < 1_000_000 {
        format!("{:.2}μs", total_ns as f64 / 1_000.0)
    } else if total_ns < 1_000_000_000 {
        format!("{:.2}ms", total_ns as f64 / 1_000_000.0)
    } else if total_ns < 60_000_000_000 {
        format!("{:.2}s", total_ns as f64 / 1_000_000_000.0)
    } else {
        let seconds = duration.as_secs();
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;

        if minutes < 60 {
            format!("{}m {}s", minutes, remaining_seconds)
        } else {
            let hours = minutes / 60;
            let remaining_minutes = minutes % 60;
            format!("{}h {}m {}s", hours, remaining_minutes, remaining_seconds)
        }
    }
}

/// Format a latency given in fractional microseconds.
///
/// Negative and non-finite inputs are shown as zero.
pub fn format_latency_us(latency_us: f64) -> String {
    if !latency_us.is_finite() || latency_us <= 0.0 {
        return format_duration(Duration::ZERO);
    }
    format_duration(Duration::from_nanos((latency_us * 1_000.0).round() as u64))
}

/// Format an operation rate in a human-readable way
///
/// Uses decimal scaling (powers of 1000):
/// - Operations/sec: < 1,000 (e.g., "750 ops/s")
/// - Thousands: < 1,000,000 (e.g., "15.50K ops/s")
/// - Millions: ≥ 1,000,000 (e.g., "2.30M ops/s")
///
/// ## Examples
///
/// ```rust
/// # use write_latency_bench::utils::format_ops_rate;
/// assert_eq!(format_ops_rate(750.0), "750 ops/s");
/// assert_eq!(format_ops_rate(15500.0), "15.50K ops/s");
/// assert_eq!(format_ops_rate(2300000.0), "2.30M ops/s");
/// ```
pub fn format_ops_rate(ops_per_second: f64) -> String {
    if ops_per_second < 1000.0 {
        format!("{:.0} ops/s", ops_per_second)
    } else if ops_per_second < 1_000_000.0 {
        format!("{:.2}K ops/s", ops_per_second / 1000.0)
    } else {
        format!("{:.2}M ops/s", ops_per_second / 1_000_000.0)
    }
}

/// Calculate statistics from a slice of values
///
/// ## Returns
/// Tuple of (mean, min, max, standard_deviation)
///
/// The standard deviation is the population standard deviation. An empty
/// slice yields all zeros.
///
/// ## Examples
///
/// ```rust
/// # use write_latency_bench::utils::calculate_stats;
/// let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
/// let (mean, min, max, std_dev) = calculate_stats(&values);
/// assert_eq!(mean, 3.0);
/// assert_eq!(min, 1.0);
/// assert_eq!(max, 5.0);
/// // std_dev ≈ 1.414
/// ```
pub fn calculate_stats(values: &[f64]) -> (f64, f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }

    let sum: f64 = values.iter().sum();
    let count = values.len() as f64;
    let mean = sum / count;

    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count;
    let std_dev = variance.sqrt();

    (mean, min, max, std_dev)
}

/// Calculate percentiles from a slice of values
///
/// Sorts a copy of the data and linearly interpolates between the two
/// samples surrounding the fractional index `(P/100) * (N-1)`.
///
/// If the input slice is empty, every requested percentile maps to 0.0.
///
/// ## Examples
///
/// ```rust
/// # use write_latency_bench::utils::calculate_percentiles;
/// let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
/// let percentiles = calculate_percentiles(&values, &[50.0, 95.0]);
/// // Returns [(50.0, 3.0), (95.0, 4.8)]
/// ```
pub fn calculate_percentiles(values: &[f64], percentiles: &[f64]) -> Vec<(f64, f64)> {
    if values.is_empty() {
        return percentiles.iter().map(|&p| (p, 0.0)).collect();
    }

    let mut sorted_values = values.to_vec();
    sorted_values.sort_by(|a, b| a.total_cmp(b));

    percentiles
        .iter()
        .map(|&p| {
            let index = (p / 100.0) * (sorted_values.len() - 1) as f64;
            let lower_index = index.floor() as usize;
            let upper_index = (index.ceil() as usize).min(sorted_values.len() - 1);

            if lower_index >= upper_index {
                (p, sorted_values[upper_index])
            } else {
                let lower_value = sorted_values[lower_index];
                let upper_value = sorted_values[upper_index];
                let weight = index - lower_index as f64;
                (p, lower_value + weight * (upper_value - lower_value))
            }
        })
        .collect()
}

/// Validate the size of each write's payload
///
/// ## Validation Rules
///
/// - **Minimum**: 1 byte
/// - **Maximum**: 16 MB, the largest frame the wire protocol carries
pub fn validate_payload_size(payload_size: usize) -> Result<()> {
    if payload_size == 0 {
        anyhow::bail!("Payload size cannot be zero");
    }
    if payload_size > 16 * 1024 * 1024 {
        anyhow::bail!("Payload size {} is too large (maximum 16MB)", payload_size);
    }
    Ok(())
}

/// Validate the measurement interval and total run time.
///
/// Checkpoints are stamped in whole microseconds, so the interval must be at
/// least 1ms for their timestamps to strictly increase.
pub fn validate_timing(measure_interval: Duration, total_exec_time: Duration) -> Result<()> {
    if measure_interval.is_zero() {
        anyhow::bail!("Measurement interval cannot be zero");
    }
    if measure_interval < Duration::from_millis(1) {
        anyhow::bail!(
            "Measurement interval {} is below the 1ms minimum",
            format_duration(measure_interval)
        );
    }
    let interval_ns = measure_interval.as_nanos();
    let intervals = (total_exec_time.as_nanos() + interval_ns - 1) / interval_ns;
    if intervals > u128::from(crate::defaults::MAX_INTERVALS) {
        anyhow::bail!(
            "Total execution time {} over a {} interval plans {} intervals; at most {} are allowed",
            format_duration(total_exec_time),
            format_duration(measure_interval),
            intervals,
            crate::defaults::MAX_INTERVALS
        );
    }
    if total_exec_time < measure_interval {
        warn!(
            "Total execution time {} is shorter than the measurement interval {}; \
             the run will last one full interval",
            format_duration(total_exec_time),
            format_duration(measure_interval)
        );
    }
    Ok(())
}

pub fn validate_capacity(capacity: usize) -> Result<()> {
    if capacity == 0 {
        anyhow::bail!("Latency recorder capacity cannot be zero");
    }
    Ok(())
}

pub fn validate_percentiles(percentiles: &[f64]) -> Result<()> {
    for &p in percentiles {
        if !(0.0..=100.0).contains(&p) {
            anyhow::bail!("Percentile {} is outside the range 0-100", p);
        }
    }
    Ok(())
}

/// Get the number of logical CPU cores available
pub fn get_cpu_cores() -> usize {
    num_cpus::get()
}

/// Pin the calling thread to `core`.
///
/// Returns `false` (and logs a warning) when the core does not exist or the
/// platform refuses the request; the benchmark still runs unpinned.
pub fn pin_current_thread(core: usize) -> bool {
    let Some(core_ids) = core_affinity::get_core_ids() else {
        warn!("Unable to enumerate CPU cores; worker thread left unpinned");
        return false;
    };

    match core_ids.into_iter().find(|id| id.id == core) {
        Some(core_id) if core_affinity::set_for_current(core_id) => {
            debug!("Pinned {:?} to CPU core {}", std::thread::current().name(), core);
            true
        }
        Some(_) => {
            warn!("Failed to pin thread to CPU core {}", core);
            false
        }
        None => {
            warn!("CPU core {} does not exist; worker thread left unpinned", core);
            false
        }
    }
}

/// Print a table row with consistent formatting
///
/// ```rust
/// # use write_latency_bench::utils::{print_table_row, print_table_separator};
/// let widths = [10, 12];
/// print_table_separator(&widths);
/// print_table_row(&["Interval", "Throughput"], &widths);
/// print_table_separator(&widths);
/// ```
pub fn print_table_row(columns: &[&str], widths: &[usize]) {
    print!("|");
    for (i, column) in columns.iter().enumerate() {
        let width = widths.get(i).copied().unwrap_or(10);
        print!(" {:width$} |", column, width = width);
    }
    println!();
}

/// Print a table separator
///
/// ```text
/// +----------+--------------+
/// | Interval | Throughput   |
/// +----------+--------------+
/// ```
pub fn print_table_separator(widths: &[usize]) {
    print!("+");
    for &width in widths {
        print!("{}", "-".repeat(width + 2));
        print!("+");
    }
    println!();
}
