use crate::error::FatalBenchmarkError;
use crate::utils::{calculate_percentiles, calculate_stats};
use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};

/// Percentile value pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileValue {
    pub percentile: f64,
    pub value_us: f64,
}

/// Latency statistics over a range of samples, in microseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub samples: usize,
    pub min_us: f64,
    pub max_us: f64,
    pub mean_us: f64,
    pub std_dev_us: f64,
    pub percentiles: Vec<PercentileValue>,
}

impl LatencyStats {
    /// Compute statistics over `samples`; `None` for an empty range.
    pub fn from_samples(samples: &[f64], percentiles: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let (mean_us, min_us, max_us, std_dev_us) = calculate_stats(samples);
        let percentiles = calculate_percentiles(samples, percentiles)
            .into_iter()
            .map(|(percentile, value_us)| PercentileValue {
                percentile,
                value_us,
            })
            .collect();

        Some(Self {
            samples: samples.len(),
            min_us,
            max_us,
            mean_us,
            std_dev_us,
            percentiles,
        })
    }

    /// Look up a computed percentile.
    pub fn percentile(&self, percentile: f64) -> Option<f64> {
        self.percentiles
            .iter()
            .find(|p| (p.percentile - percentile).abs() < 1e-9)
            .map(|p| p.value_us)
    }
}

/// Operations completed over a time window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThroughputStats {
    pub operations: usize,
    pub duration_us: u64,
    pub ops_per_second: f64,
}

impl ThroughputStats {
    pub fn new(operations: usize, duration_us: u64) -> Self {
        let duration_secs = duration_us as f64 / 1_000_000.0;
        let ops_per_second = if duration_secs > 0.0 {
            operations as f64 / duration_secs
        } else {
            0.0
        };

        Self {
            operations,
            duration_us,
            ops_per_second,
        }
    }
}

/// Statistics for the window between two consecutive checkpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalStats {
    /// Zero-based interval number
    pub index: usize,
    /// Offset of the window start from the beginning of the run
    pub start_us: u64,
    pub throughput: ThroughputStats,
    pub latency: Option<LatencyStats>,
}

/// One bucket of the log-scaled latency distribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Inclusive upper bound of the bucket
    pub upper_bound_us: u64,
    pub count: u64,
}

/// Whole-run statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallStats {
    pub throughput: ThroughputStats,
    pub latency: Option<LatencyStats>,
    pub distribution: Vec<HistogramBucket>,
}

/// Time-bucketed results of one benchmark run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub label: String,
    pub intervals: Vec<IntervalStats>,
    pub overall: OverallStats,
}

/// Bucket samples into power-of-two microsecond buckets.
///
/// Samples are rounded to whole microseconds. The first bucket covers
/// `0..=1us` and each following bucket doubles the upper bound, up to the
/// bucket containing the largest sample.
pub fn latency_distribution(samples: &[f64]) -> Result<Vec<HistogramBucket>, FatalBenchmarkError> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    // 3 significant figures, auto-resizing
    let mut histogram =
        Histogram::<u64>::new(3).map_err(|e| FatalBenchmarkError::Histogram(e.to_string()))?;
    for &sample in samples {
        let value = if sample.is_finite() && sample > 0.0 {
            sample.round() as u64
        } else {
            0
        };
        histogram
            .record(value)
            .map_err(|e| FatalBenchmarkError::Histogram(e.to_string()))?;
    }

    Ok(histogram
        .iter_log(1, 2.0)
        .map(|bucket| HistogramBucket {
            upper_bound_us: bucket.value_iterated_to(),
            count: bucket.count_since_last_iteration(),
        })
        .collect())
}
