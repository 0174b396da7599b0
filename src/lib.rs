//! # dumpbeam
//!
//! Chunked, parallel batch processing of large tab-separated record dumps.
//!
//! A dump holds one record per line: five tab-separated columns (type, id,
//! revision, timestamp, JSON payload). dumpbeam splits a dump into
//! line-aligned byte ranges, hands each range to an isolated worker, and runs
//! the worker's records in batches through an ordered list of stages. Every
//! stage returns a [`StageResult`] that carries successes and per-record
//! failures side by side, so one bad record never aborts a batch.
//!
//! ## Data flow
//!
//! ```text
//! file ─▶ FileChunker ─▶ [Chunk] ─▶ Dispatcher
//!                                     │ (one worker per chunk)
//!                                     ▼
//!        RecordStream ─▶ batched ─▶ EntryParser ─▶ stage 0 ─▶ … ─▶ stage n
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use dumpbeam::dispatcher::Dispatcher;
//! use dumpbeam::io::FileChunker;
//! use dumpbeam::plan::{PipelinePlan, StageKind};
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let plan = PipelinePlan::default()
//!     .then(StageKind::EditionFields)
//!     .then(StageKind::Summary { path: "out/summary.jsonl".into() });
//!
//! let chunks = FileChunker::new().split("ol_dump_editions.txt", 8)?.chunks;
//! let (stages, contexts) = plan.factories();
//! let summary = Dispatcher::new(4, 250)?.run_all(&stages, &contexts, &chunks)?;
//! assert!(summary.is_success());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`chunk`], [`io`]: byte ranges, the chunker, the record stream
//! - [`record`]: transport and domain records, the entry parser
//! - [`result`]: `Success` / `Failure` / `StageResult` and failure policies
//! - [`stage`]: the stage contract, contexts and built-in stages
//! - [`worker`], [`dispatcher`]: per-chunk execution and the worker pool
//! - [`plan`], [`config`]: serializable pipelines and run configuration
//! - [`repository`], [`year`]: persistence and date normalization collaborators
//! - [`testing`]: fixtures and instrumented stages for tests

pub mod chunk;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod helpers;
pub mod io;
pub mod locks;
pub mod logging;
pub mod plan;
pub mod record;
pub mod repository;
pub mod result;
pub mod stage;
pub mod testing;
pub mod worker;
pub mod year;

pub use chunk::Chunk;
pub use config::RunConfig;
pub use dispatcher::{DispatchMode, DispatchSummary, Dispatcher, WorkerCommand, process_chunk};
pub use error::PipelineError;
pub use helpers::{BatchExt, batched};
pub use io::{ChunkPlan, FileChunker, RecordStream, stream};
pub use locks::PathLocks;
pub use plan::{PipelinePlan, StageKind, StageSpec};
pub use record::{AuthorRecord, DomainRecord, EditionRecord, Record, TransportRecord};
pub use result::{Failure, FailurePolicy, RecordFailure, StageResult, Success};
pub use stage::{ContextFactory, PipelineContext, Stage, StageFactory, write_shutdown_info};
pub use worker::{WorkerPipeline, WorkerReport, run_worker};
pub use year::normalize_year;
