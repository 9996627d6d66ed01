//! # Result Aggregation
//!
//! Turns the flat sample array and the checkpoint sequence of a finished run
//! into a [`BenchmarkReport`], then hands the report to a [`ReportSink`].
//!
//! For each consecutive checkpoint pair `(c_i, c_i+1)` the interval covers
//! `samples[c_i.cursor..c_i+1.cursor)`:
//!
//! - throughput = `(c_i+1.cursor - c_i.cursor) / (c_i+1.t - c_i.t)` in ops/s
//! - latency statistics are computed over the same slice
//!
//! The overall summary spans the first to the last checkpoint.
//!
//! A malformed checkpoint sequence means the harness itself is broken and is
//! fatal. A sink that cannot be written only produces a warning.

use crate::error::FatalBenchmarkError;
use crate::metrics::{
    latency_distribution, BenchmarkReport, IntervalStats, LatencyStats, OverallStats,
    ThroughputStats,
};
use crate::results::ReportSink;
use crate::supervisor::Checkpoint;
use tracing::{debug, info, warn};

/// What happened when the report was handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    Written { destination: String },
    Failed { destination: String, reason: String },
}

impl SinkOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, SinkOutcome::Written { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ResultAggregator {
    percentiles: Vec<f64>,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new(crate::defaults::PERCENTILES.to_vec())
    }
}

impl ResultAggregator {
    pub fn new(percentiles: Vec<f64>) -> Self {
        Self { percentiles }
    }

    pub fn percentiles(&self) -> &[f64] {
        &self.percentiles
    }

    /// Check the checkpoint invariants against the recorded sample count.
    pub fn validate(sample_count: usize, checkpoints: &[Checkpoint]) -> Result<(), FatalBenchmarkError> {
        let first = checkpoints
            .first()
            .ok_or_else(|| FatalBenchmarkError::MalformedCheckpoints {
                index: 0,
                reason: "checkpoint sequence is empty".to_string(),
            })?;
        if first.cursor > sample_count {
            return Err(FatalBenchmarkError::MalformedCheckpoints {
                index: 0,
                reason: format!(
                    "cursor {} exceeds the {} recorded samples",
                    first.cursor, sample_count
                ),
            });
        }

        for (offset, pair) in checkpoints.windows(2).enumerate() {
            let index = offset + 1;
            let (prev, next) = (&pair[0], &pair[1]);
            if next.cursor < prev.cursor {
                return Err(FatalBenchmarkError::MalformedCheckpoints {
                    index,
                    reason: format!("cursor decreased from {} to {}", prev.cursor, next.cursor),
                });
            }
            if next.timestamp_us <= prev.timestamp_us {
                return Err(FatalBenchmarkError::MalformedCheckpoints {
                    index,
                    reason: format!(
                        "timestamp {}us does not follow {}us",
                        next.timestamp_us, prev.timestamp_us
                    ),
                });
            }
            if next.cursor > sample_count {
                return Err(FatalBenchmarkError::MalformedCheckpoints {
                    index,
                    reason: format!(
                        "cursor {} exceeds the {} recorded samples",
                        next.cursor, sample_count
                    ),
                });
            }
        }
        Ok(())
    }

    /// Build the report. Pure: identical inputs give identical reports.
    pub fn summarize(
        &self,
        samples: &[f64],
        checkpoints: &[Checkpoint],
        label: &str,
    ) -> Result<BenchmarkReport, FatalBenchmarkError> {
        Self::validate(samples.len(), checkpoints)?;

        let intervals: Vec<IntervalStats> = checkpoints
            .windows(2)
            .enumerate()
            .map(|(index, pair)| {
                let (start, end) = (&pair[0], &pair[1]);
                let window = &samples[start.cursor..end.cursor];
                IntervalStats {
                    index,
                    start_us: start.timestamp_us,
                    throughput: ThroughputStats::new(
                        window.len(),
                        end.timestamp_us - start.timestamp_us,
                    ),
                    latency: LatencyStats::from_samples(window, &self.percentiles),
                }
            })
            .collect();

        // validate() guarantees at least one checkpoint
        let (first, last) = (&checkpoints[0], &checkpoints[checkpoints.len() - 1]);
        let overall_window = &samples[first.cursor..last.cursor];
        let overall = OverallStats {
            throughput: ThroughputStats::new(
                overall_window.len(),
                last.timestamp_us - first.timestamp_us,
            ),
            latency: LatencyStats::from_samples(overall_window, &self.percentiles),
            distribution: latency_distribution(overall_window)?,
        };

        debug!(
            "Summarized {} intervals over {} samples",
            intervals.len(),
            overall_window.len()
        );

        Ok(BenchmarkReport {
            label: label.to_string(),
            intervals,
            overall,
        })
    }

    /// Summarize and write the report to `sink`.
    ///
    /// Only a malformed checkpoint sequence is an error; a failing sink is
    /// reported through the returned [`SinkOutcome`].
    pub fn aggregate(
        &self,
        samples: &[f64],
        checkpoints: &[Checkpoint],
        sink: &mut dyn ReportSink,
        label: &str,
    ) -> Result<(BenchmarkReport, SinkOutcome), FatalBenchmarkError> {
        info!("Post processing results...");
        let report = self.summarize(samples, checkpoints, label)?;

        let destination = sink.destination();
        let outcome = match sink.write_report(&report) {
            Ok(()) => {
                info!("Results written to {}", destination);
                SinkOutcome::Written { destination }
            }
            Err(e) => {
                warn!("Failed to write results to {}: {:#}", destination, e);
                SinkOutcome::Failed {
                    destination,
                    reason: format!("{:#}", e),
                }
            }
        };

        Ok((report, outcome))
    }
}
