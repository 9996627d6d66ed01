//! # Run Supervisor
//!
//! The supervisor owns one measurement run end to end:
//!
//! 1. Record the initial checkpoint `(cursor = 0, t = 0)`.
//! 2. Spawn the worker on its own OS thread.
//! 3. Wait one full measurement interval, then record
//!    `(recorder.snapshot(), now)`; repeat while the run time is below the
//!    configured total.
//! 4. Raise the stop flag and join the worker.
//!
//! ## Run Length
//!
//! The total-time check happens only after a full interval has elapsed, so
//! the run lasts the configured total rounded up to the next multiple of the
//! interval, and never less than one interval. The loop counts completed
//! intervals against that rounded-up target so the number of checkpoints does
//! not depend on timer jitter: a 2s interval over 10s produces exactly six
//! checkpoints.
//!
//! ## Early Worker Exit
//!
//! The interval wait is a `recv_timeout` on a channel the worker signals when
//! it exits. A worker that dies early (failed write, full recorder, panic)
//! wakes the supervisor immediately; no further checkpoints are recorded and
//! the worker's error is returned.

use crate::backend::WriteBackend;
use crate::error::FatalBenchmarkError;
use crate::recorder::LatencyRecorder;
use crate::utils::{format_ops_rate, pin_current_thread};
use crate::worker::Worker;
use crossbeam::channel::{self, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Progress marker taken at an interval boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Samples recorded when the checkpoint was taken
    pub cursor: usize,
    /// Microseconds since the start of the run
    pub timestamp_us: u64,
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub measure_interval: Duration,
    pub total_exec_time: Duration,
    pub capacity: usize,
    pub payload_size: usize,
    /// CPU core to pin the worker thread to
    pub worker_affinity: Option<usize>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            measure_interval: crate::defaults::MEASURE_INTERVAL,
            total_exec_time: crate::defaults::TOTAL_EXEC_TIME,
            capacity: crate::defaults::RECORDER_CAPACITY,
            payload_size: crate::defaults::PAYLOAD_SIZE,
            worker_affinity: None,
        }
    }
}

/// Everything a finished run hands to aggregation.
#[derive(Debug, Clone)]
pub struct RunData {
    pub samples: Vec<f64>,
    pub checkpoints: Vec<Checkpoint>,
    /// Writes completed by the worker
    pub operations: u64,
}

pub struct Supervisor {
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Number of measurement intervals the run will last.
    pub fn planned_intervals(&self) -> u64 {
        let interval = self.config.measure_interval.as_nanos().max(1);
        let total = self.config.total_exec_time.as_nanos();
        let intervals = (total + interval - 1) / interval;
        intervals.clamp(1, u128::from(u64::MAX)) as u64
    }

    /// Run a full benchmark with a freshly allocated recorder.
    pub fn run<B: WriteBackend>(&self, backend: B) -> Result<RunData, FatalBenchmarkError> {
        debug!(
            "Allocating latency recorder with {} slots",
            self.config.capacity
        );
        let recorder = LatencyRecorder::new(self.config.capacity);
        let (checkpoints, operations) = self.run_with_recorder(&recorder, backend)?;

        Ok(RunData {
            samples: recorder.samples(),
            checkpoints,
            operations,
        })
    }

    /// Run the checkpoint protocol against a caller-provided recorder.
    ///
    /// The worker has been joined by the time this returns, whatever the
    /// outcome, so `recorder` is no longer written to.
    pub fn run_with_recorder<B: WriteBackend>(
        &self,
        recorder: &LatencyRecorder,
        backend: B,
    ) -> Result<(Vec<Checkpoint>, u64), FatalBenchmarkError> {
        let planned = self.planned_intervals();
        let interval = self.config.measure_interval;
        let payload_size = self.config.payload_size;
        let worker_affinity = self.config.worker_affinity;

        let stop = AtomicBool::new(false);
        let (exit_tx, exit_rx) = channel::bounded::<()>(1);
        let reserved = planned.min(crate::defaults::MAX_INTERVALS) as usize + 1;
        let mut checkpoints = Vec::with_capacity(reserved);

        let start = Instant::now();
        checkpoints.push(Checkpoint {
            cursor: recorder.snapshot(),
            timestamp_us: 0,
        });

        thread::scope(|scope| {
            let stop_ref = &stop;
            let handle = thread::Builder::new()
                .name("bench-worker".to_string())
                .spawn_scoped(scope, move || {
                    if let Some(core) = worker_affinity {
                        pin_current_thread(core);
                    }
                    let mut worker = Worker::new(backend, payload_size);
                    let result = worker.run(stop_ref, recorder);
                    // The receiver only goes away once the supervisor is done waiting
                    let _ = exit_tx.send(());
                    result
                })
                .map_err(FatalBenchmarkError::WorkerSpawn)?;

            for index in 1..=planned {
                match exit_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        warn!("Worker exited before the run completed (interval {})", index);
                        break;
                    }
                }

                let checkpoint = Checkpoint {
                    cursor: recorder.snapshot(),
                    timestamp_us: start.elapsed().as_micros() as u64,
                };
                log_progress(index, planned, checkpoints.last(), &checkpoint);
                checkpoints.push(checkpoint);
            }

            stop.store(true, Ordering::Release);
            debug!("Stop requested; waiting for worker to finish its current write");

            let operations = match handle.join() {
                Ok(result) => result?,
                Err(_) => return Err(FatalBenchmarkError::WorkerPanicked),
            };

            debug!(
                "Worker joined after {} writes, {} checkpoints recorded",
                operations,
                checkpoints.len()
            );
            Ok((checkpoints, operations))
        })
    }
}

fn log_progress(index: u64, planned: u64, previous: Option<&Checkpoint>, current: &Checkpoint) {
    let (ops, elapsed_us) = match previous {
        Some(prev) => (
            current.cursor.saturating_sub(prev.cursor),
            current.timestamp_us.saturating_sub(prev.timestamp_us),
        ),
        None => (current.cursor, current.timestamp_us),
    };
    let rate = if elapsed_us > 0 {
        ops as f64 / (elapsed_us as f64 / 1_000_000.0)
    } else {
        0.0
    };

    info!(
        "Interval {}/{}: {} writes ({})",
        index,
        planned,
        ops,
        format_ops_rate(rate)
    );
    debug!(
        "Checkpoint {}: cursor={} t={}us",
        index, current.cursor, current.timestamp_us
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;

    fn config(interval_ms: u64, total_ms: u64, capacity: usize) -> SupervisorConfig {
        SupervisorConfig {
            measure_interval: Duration::from_millis(interval_ms),
            total_exec_time: Duration::from_millis(total_ms),
            capacity,
            payload_size: 16,
            worker_affinity: None,
        }
    }

    fn slow_backend(delay: Duration) -> impl FnMut(u64, &[u8]) -> Result<(), BackendError> + Send {
        move |_: u64, _: &[u8]| {
            thread::sleep(delay);
            Ok(())
        }
    }

    #[test]
    fn test_planned_intervals_round_up() {
        assert_eq!(Supervisor::new(config(2000, 10000, 1)).planned_intervals(), 5);
        assert_eq!(Supervisor::new(config(2000, 10001, 1)).planned_intervals(), 6);
        assert_eq!(Supervisor::new(config(2000, 1, 1)).planned_intervals(), 1);
        assert_eq!(Supervisor::new(config(2000, 0, 1)).planned_intervals(), 1);
    }

    #[test]
    fn test_run_produces_one_checkpoint_per_interval_plus_initial() {
        // Scaled-down version of a 2s interval over a 10s run
        let supervisor = Supervisor::new(config(20, 100, 1 << 20));
        let data = supervisor
            .run(slow_backend(Duration::from_micros(200)))
            .unwrap();

        assert_eq!(data.checkpoints.len(), 6);
        assert_eq!(data.checkpoints[0], Checkpoint { cursor: 0, timestamp_us: 0 });
        // The final checkpoint lands at or after the configured total
        assert!(data.checkpoints[5].timestamp_us >= 100_000);
    }

    #[test]
    fn test_checkpoints_are_monotonic() {
        let supervisor = Supervisor::new(config(10, 60, 1 << 20));
        let data = supervisor
            .run(slow_backend(Duration::from_micros(50)))
            .unwrap();

        for pair in data.checkpoints.windows(2) {
            assert!(pair[0].cursor <= pair[1].cursor);
            assert!(pair[0].timestamp_us < pair[1].timestamp_us);
        }
    }

    #[test]
    fn test_no_samples_lost_under_capacity() {
        let supervisor = Supervisor::new(config(10, 30, 1 << 20));
        let data = supervisor
            .run(slow_backend(Duration::from_micros(100)))
            .unwrap();

        assert!(data.operations > 0);
        assert_eq!(data.samples.len() as u64, data.operations);
        let final_cursor = data.checkpoints.last().unwrap().cursor;
        assert!(final_cursor <= data.samples.len());
        assert!(data.samples.iter().all(|&s| s > 0.0));
    }

    #[test]
    fn test_snapshot_stable_after_join() {
        let recorder = LatencyRecorder::new(1 << 20);
        let supervisor = Supervisor::new(config(10, 20, 1 << 20));
        let (_, operations) = supervisor
            .run_with_recorder(&recorder, slow_backend(Duration::from_micros(100)))
            .unwrap();

        let after_join = recorder.snapshot();
        assert_eq!(after_join as u64, operations);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(recorder.snapshot(), after_join);
    }

    #[test]
    fn test_backend_failure_ends_run_early() {
        let supervisor = Supervisor::new(config(50, 10_000, 1 << 20));
        let started = Instant::now();
        let result = supervisor.run(|id: u64, _: &[u8]| -> Result<(), BackendError> {
            if id == 10 {
                Err(BackendError::Rejected {
                    record_id: id,
                    reason: "constraint violation".to_string(),
                })
            } else {
                Ok(())
            }
        });

        match result {
            Err(FatalBenchmarkError::BackendFailure { record_id, .. }) => assert_eq!(record_id, 10),
            other => panic!("expected backend failure, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_capacity_exhaustion_ends_run_with_full_recorder() {
        let recorder = LatencyRecorder::new(100);
        let supervisor = Supervisor::new(config(50, 10_000, 100));
        let result = supervisor.run_with_recorder(&recorder, |_: u64, _: &[u8]| -> Result<(), BackendError> {
            Ok(())
        });

        assert!(matches!(
            result,
            Err(FatalBenchmarkError::CapacityExhausted { capacity: 100 })
        ));
        assert_eq!(recorder.snapshot(), 100);
    }

    #[test]
    fn test_very_long_run_does_not_reserve_per_interval() {
        let long_run = SupervisorConfig {
            measure_interval: Duration::from_millis(1),
            total_exec_time: Duration::from_secs(100_000 * 3600),
            ..config(1, 0, 4)
        };
        let supervisor = Supervisor::new(long_run);
        assert_eq!(supervisor.planned_intervals(), 360_000_000_000);

        let result = supervisor.run(|_: u64, _: &[u8]| -> Result<(), BackendError> { Ok(()) });
        assert!(matches!(
            result,
            Err(FatalBenchmarkError::CapacityExhausted { capacity: 4 })
        ));
    }

    #[test]
    fn test_worker_panic_is_reported() {
        let supervisor = Supervisor::new(config(50, 10_000, 16));
        let result = supervisor.run(|_: u64, _: &[u8]| -> Result<(), BackendError> {
            panic!("backend exploded")
        });
        assert!(matches!(result, Err(FatalBenchmarkError::WorkerPanicked)));
    }
}
