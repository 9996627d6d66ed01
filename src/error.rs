//! # Error Types
//!
//! Two error families exist in the harness:
//!
//! - [`BackendError`]: anything that can go wrong while a backend performs a
//!   single write (I/O, framing, a rejected insert).
//! - [`FatalBenchmarkError`]: conditions that invalidate the measurement run.
//!   These are never retried. They travel as ordinary `Result` values up to
//!   the binary's entry point, which is the only place that exits the process.
//!
//! Setup errors (bad arguments, connection refused, unwritable output file)
//! stay on `anyhow::Result` like the rest of the crate.

use thiserror::Error;

/// Errors produced by a [`crate::backend::WriteBackend`] for a single write.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),

    #[error("write of record {record_id} rejected: {reason}")]
    Rejected { record_id: u64, reason: String },

    #[error("response for record {received} does not match request {expected}")]
    ResponseMismatch { expected: u64, received: u64 },

    #[error("connection closed by the target")]
    Disconnected,
}

/// Conditions that terminate a benchmark run.
#[derive(Debug, Error)]
pub enum FatalBenchmarkError {
    #[error("backend write of record {record_id} failed: {source}")]
    BackendFailure {
        record_id: u64,
        #[source]
        source: BackendError,
    },

    #[error("latency recorder exhausted: all {capacity} sample slots are in use")]
    CapacityExhausted { capacity: usize },

    #[error("malformed checkpoint sequence at index {index}: {reason}")]
    MalformedCheckpoints { index: usize, reason: String },

    #[error("benchmark worker thread panicked")]
    WorkerPanicked,

    #[error("failed to spawn benchmark worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("latency histogram error: {0}")]
    Histogram(String),
}

impl FatalBenchmarkError {
    /// Process exit code for this condition.
    pub fn exit_code(&self) -> i32 {
        match self {
            FatalBenchmarkError::BackendFailure { .. } => 2,
            FatalBenchmarkError::CapacityExhausted { .. } => 3,
            FatalBenchmarkError::MalformedCheckpoints { .. } => 4,
            FatalBenchmarkError::WorkerPanicked
            | FatalBenchmarkError::WorkerSpawn(_)
            | FatalBenchmarkError::Histogram(_) => 1,
        }
    }
}

/// Failure of a whole benchmark invocation, as seen by the binary.
#[derive(Debug, Error)]
pub enum RunError {
    /// The measurement run itself failed
    #[error(transparent)]
    Fatal(#[from] FatalBenchmarkError),

    /// Configuration, connection or other setup failure
    #[error(transparent)]
    Setup(#[from] anyhow::Error),
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Fatal(e) => e.exit_code(),
            RunError::Setup(_) => 1,
        }
    }
}
