//! Error taxonomy for chunk planning, worker setup and execution.
//!
//! Record-level problems never show up here: they are carried as
//! [`RecordFailure`](crate::result::RecordFailure) values inside a
//! [`StageResult`](crate::result::StageResult). `PipelineError` covers the
//! failures that abort an operation (chunk planning, a worker, a dispatch).
//! Call sites wrap these in `anyhow::Error` with context, and tests can
//! recover the variant with `err.downcast_ref::<PipelineError>()`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Zero-width or inverted chunk range.
    #[error("invalid chunk boundary [{start}-{end}) for {}", .file.display())]
    Boundary { file: PathBuf, start: u64, end: u64 },

    /// I/O failure while planning chunks or streaming records.
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Mismatched factories, wrong context type, misplaced consumer, bad sizes.
    #[error("configuration error: {0}")]
    Config(String),

    /// A stage reported a catastrophic failure for a batch.
    #[error("stage {stage_id} ({stage_name}) failed: {details}")]
    StageFailed {
        stage_id: usize,
        stage_name: String,
        details: String,
    },

    /// A worker (thread or child process) did not complete its chunk.
    #[error("worker {label} failed: {reason}")]
    Worker { label: String, reason: String },
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
