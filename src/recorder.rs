//! # Latency Recorder
//!
//! A fixed-capacity, pre-allocated, append-only array of latency samples with
//! an atomic write cursor.
//!
//! The whole buffer is allocated and zeroed up front so that recording never
//! allocates while the worker is timing operations. Each slot is an
//! `AtomicU64` holding the bit pattern of an `f64` duration in microseconds,
//! which makes the recorder `Sync` without locks.
//!
//! ## Access Pattern
//!
//! - One writer (the benchmark worker) calls [`LatencyRecorder::record`].
//! - The supervisor calls [`LatencyRecorder::snapshot`] at interval boundaries
//!   while the writer is active. It never reads sample contents at that time.
//! - Sample contents are read with [`LatencyRecorder::samples`] after the
//!   writer thread has been joined.

use crate::error::FatalBenchmarkError;
use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Lock-free latency sample buffer.
pub struct LatencyRecorder {
    samples: Box<[AtomicU64]>,
    cursor: CachePadded<AtomicUsize>,
}

impl LatencyRecorder {
    /// Allocate a recorder with room for `capacity` samples.
    ///
    /// A zero capacity is clamped to one slot so that `record` always has a
    /// well-defined first index.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let samples: Box<[AtomicU64]> = (0..capacity).map(|_| AtomicU64::new(0)).collect();

        Self {
            samples,
            cursor: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Reserve the next slot and store `duration_us` in it.
    ///
    /// Returns the slot index on success. When every slot is taken the cursor
    /// is left at `capacity` and `CapacityExhausted` is returned; the sample
    /// is discarded.
    pub fn record(&self, duration_us: f64) -> Result<usize, FatalBenchmarkError> {
        let capacity = self.samples.len();
        let index = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cursor| {
                (cursor < capacity).then_some(cursor + 1)
            })
            .map_err(|_| FatalBenchmarkError::CapacityExhausted { capacity })?;

        self.samples[index].store(duration_us.to_bits(), Ordering::Release);
        Ok(index)
    }

    /// Record a [`Duration`], converted to fractional microseconds.
    pub fn record_duration(&self, duration: Duration) -> Result<usize, FatalBenchmarkError> {
        self.record(duration.as_secs_f64() * 1_000_000.0)
    }

    /// Current cursor: the number of samples recorded so far.
    pub fn snapshot(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn remaining(&self) -> usize {
        self.capacity() - self.snapshot()
    }

    /// Copy out `samples[0..cursor)`.
    ///
    /// Only meaningful once the writer has stopped; a concurrent call may see
    /// a reserved slot whose value has not been stored yet.
    pub fn samples(&self) -> Vec<f64> {
        let len = self.snapshot();
        self.samples[..len]
            .iter()
            .map(|slot| f64::from_bits(slot.load(Ordering::Acquire)))
            .collect()
    }
}

impl std::fmt::Debug for LatencyRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyRecorder")
            .field("capacity", &self.capacity())
            .field("cursor", &self.snapshot())
            .finish()
    }
}
