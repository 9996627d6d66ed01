//! # Benchmark Worker
//!
//! The worker is the closed loop: issue one write, wait for it to complete,
//! record how long it took, repeat. It owns the backend connection and the
//! fixed payload, and borrows the recorder and the stop flag from the
//! supervisor.
//!
//! The stop flag is checked at the top of every iteration, so an in-flight
//! write always completes (or fails) before the worker exits. A failed write
//! or a full recorder ends the loop immediately with a fatal error.

use crate::backend::WriteBackend;
use crate::error::FatalBenchmarkError;
use crate::recorder::LatencyRecorder;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, error};

/// Byte used to fill the synthetic payload.
const PAYLOAD_FILL: u8 = b'0';

pub struct Worker<B> {
    backend: B,
    payload: Vec<u8>,
}

impl<B: WriteBackend> Worker<B> {
    pub fn new(backend: B, payload_size: usize) -> Self {
        Self {
            backend,
            payload: vec![PAYLOAD_FILL; payload_size],
        }
    }

    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }

    /// Run until `stop` is observed, returning the number of completed writes.
    ///
    /// Record ids start at 0 and increase by one per write, so the returned
    /// count is also the next id that would have been written.
    pub fn run(
        &mut self,
        stop: &AtomicBool,
        recorder: &LatencyRecorder,
    ) -> Result<u64, FatalBenchmarkError> {
        debug!(
            "Worker started against {} backend with {} byte payload",
            self.backend.name(),
            self.payload.len()
        );
        let mut record_id: u64 = 0;

        while !stop.load(Ordering::Acquire) {
            let start = Instant::now();
            if let Err(source) = self.backend.write(record_id, &self.payload) {
                error!("Write of record {} failed: {}", record_id, source);
                return Err(FatalBenchmarkError::BackendFailure { record_id, source });
            }
            let elapsed = start.elapsed();

            recorder.record_duration(elapsed)?;
            record_id += 1;
        }

        debug!("Worker stopped after {} writes", record_id);
        Ok(record_id)
    }
}
