//! Chunk dispatch: one worker per chunk, a bounded number at a time.
//!
//! Two execution modes share the same contract:
//!
//! - [`DispatchMode::Threads`]: a dedicated rayon pool of `pool_size`
//!   threads runs [`WorkerPipeline`]s built from closure factories. Each
//!   worker gets fresh stage and context instances.
//! - [`DispatchMode::Processes`]: at most `pool_size` child processes run
//!   `dumpbeam worker` for one chunk each, rebuilding the pipeline from a
//!   serialized [`PipelinePlan`]. Workers share nothing but the input file.
//!
//! In both modes a failing worker is logged and counted; the others carry on.
//! Workers return no record data to the dispatcher.

use crate::chunk::Chunk;
use crate::error::PipelineError;
use crate::locks::PathLocks;
use crate::plan::PipelinePlan;
use crate::stage::{ContextFactory, StageFactory};
use crate::worker::{WorkerPipeline, WorkerReport};
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// How workers are isolated from each other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    Threads,
    #[default]
    Processes,
}

/// Outcome counts of a dispatch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub completed: usize,
    pub failed: usize,
    /// Labels of the workers that failed.
    pub failed_workers: Vec<String>,
}

impl DispatchSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, label: &str, outcome: Result<()>) {
        match outcome {
            Ok(()) => self.completed += 1,
            Err(e) => {
                tracing::error!(worker = label, "worker failed: {e:#}");
                self.failed += 1;
                self.failed_workers.push(label.to_string());
            }
        }
    }
}

/// Label of the worker processing the `index`-th chunk of a dispatch.
pub fn worker_label(index: usize) -> String {
    format!("worker-{index}")
}

/// Run one chunk through a freshly built pipeline.
///
/// # Errors
/// Returns setup, I/O and stage errors from [`WorkerPipeline`].
pub fn process_chunk(
    stage_factories: &[StageFactory],
    context_factories: &[ContextFactory],
    chunk: &Chunk,
    batch_size: usize,
    label: &str,
    locks: &PathLocks,
) -> Result<WorkerReport> {
    WorkerPipeline::build(label, locks, stage_factories, context_factories)?
        .run(chunk.file_name(), chunk.start(), chunk.end(), batch_size)
        .with_context(|| format!("{label}: {chunk}"))
}

/// How to launch a child worker process.
#[derive(Clone, Debug)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl WorkerCommand {
    /// Run `program [args..] worker ...` for each chunk.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Re-execute the running binary.
    ///
    /// # Errors
    /// Returns an error if the executable path cannot be determined.
    pub fn current_exe() -> Result<Self> {
        let exe = std::env::current_exe().context("locate current executable")?;
        Ok(Self::new(exe))
    }

    /// Arguments placed before the `worker` subcommand.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn for_chunk(&self, chunk: &Chunk, batch_size: usize, label: &str, plan_json: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("worker")
            .arg("--file")
            .arg(chunk.file_name())
            .arg("--start")
            .arg(chunk.start().to_string())
            .arg("--end")
            .arg(chunk.end().to_string())
            .arg("--batch-size")
            .arg(batch_size.to_string())
            .arg("--label")
            .arg(label)
            .arg("--plan-json")
            .arg(plan_json)
            .stdin(Stdio::null());
        cmd
    }
}

#[derive(Clone, Debug)]
pub struct Dispatcher {
    pool_size: usize,
    batch_size: usize,
    locks: PathLocks,
}

impl Dispatcher {
    /// # Errors
    /// Returns [`PipelineError::Config`] when either size is zero.
    pub fn new(pool_size: usize, batch_size: usize) -> Result<Self, PipelineError> {
        if pool_size == 0 {
            return Err(PipelineError::config("pool size must be at least 1"));
        }
        if batch_size == 0 {
            return Err(PipelineError::config("batch size must be at least 1"));
        }
        Ok(Self {
            pool_size,
            batch_size,
            locks: PathLocks::new(),
        })
    }

    /// Share an existing lock registry with the workers.
    #[must_use]
    pub fn with_locks(mut self, locks: PathLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn locks(&self) -> &PathLocks {
        &self.locks
    }

    fn pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.pool_size)
            .thread_name(|i| format!("dumpbeam-dispatch-{i}"))
            .build()
            .context("build dispatch pool")
    }

    /// Process every chunk on a pool of `pool_size` threads.
    ///
    /// A worker that panics is counted as failed like any other.
    ///
    /// # Errors
    /// Only fails when the pool cannot be created; worker failures are
    /// reported in the summary.
    pub fn run_all(
        &self,
        stage_factories: &[StageFactory],
        context_factories: &[ContextFactory],
        chunks: &[Chunk],
    ) -> Result<DispatchSummary> {
        tracing::info!(
            chunks = chunks.len(),
            pool_size = self.pool_size,
            "dispatching chunks to threads"
        );
        let outcomes: Vec<(String, Result<()>)> = self.pool()?.install(|| {
            chunks
                .par_iter()
                .enumerate()
                .map(|(i, chunk)| {
                    let label = worker_label(i);
                    let outcome = catch_unwind(AssertUnwindSafe(|| {
                        process_chunk(
                            stage_factories,
                            context_factories,
                            chunk,
                            self.batch_size,
                            &label,
                            &self.locks,
                        )
                    }))
                    .unwrap_or_else(|payload| {
                        Err(PipelineError::Worker {
                            label: label.clone(),
                            reason: format!("panicked: {}", panic_message(payload.as_ref())),
                        }
                        .into())
                    })
                    .map(|_| ());
                    (label, outcome)
                })
                .collect()
        });
        Ok(summarize(outcomes))
    }

    /// Process every chunk in its own child process, at most `pool_size` at once.
    ///
    /// # Errors
    /// Fails when the plan is invalid or the pool cannot be created; child
    /// failures are reported in the summary.
    pub fn run_all_processes(
        &self,
        plan: &PipelinePlan,
        chunks: &[Chunk],
        command: &WorkerCommand,
    ) -> Result<DispatchSummary> {
        plan.validate()?;
        let plan_json = plan.to_json()?;
        tracing::info!(
            chunks = chunks.len(),
            pool_size = self.pool_size,
            program = %command.program().display(),
            "dispatching chunks to processes"
        );
        let outcomes: Vec<(String, Result<()>)> = self.pool()?.install(|| {
            chunks
                .par_iter()
                .enumerate()
                .map(|(i, chunk)| {
                    let label = worker_label(i);
                    let outcome = run_child(command, chunk, self.batch_size, &label, &plan_json);
                    (label, outcome)
                })
                .collect()
        });
        Ok(summarize(outcomes))
    }

    /// Dispatch `chunks` in the given mode, rebuilding factories from `plan`
    /// for thread mode.
    ///
    /// # Errors
    /// See [`run_all`](Self::run_all) and [`run_all_processes`](Self::run_all_processes).
    pub fn run_plan(
        &self,
        mode: DispatchMode,
        plan: &PipelinePlan,
        chunks: &[Chunk],
        command: &WorkerCommand,
    ) -> Result<DispatchSummary> {
        match mode {
            DispatchMode::Threads => {
                plan.validate()?;
                let (stages, contexts) = plan.factories();
                self.run_all(&stages, &contexts, chunks)
            }
            DispatchMode::Processes => self.run_all_processes(plan, chunks, command),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}

fn summarize(outcomes: Vec<(String, Result<()>)>) -> DispatchSummary {
    let mut summary = DispatchSummary::default();
    for (label, outcome) in outcomes {
        summary.record(&label, outcome);
    }
    tracing::info!(
        completed = summary.completed,
        failed = summary.failed,
        "dispatch finished"
    );
    summary
}

fn run_child(
    command: &WorkerCommand,
    chunk: &Chunk,
    batch_size: usize,
    label: &str,
    plan_json: &str,
) -> Result<()> {
    tracing::debug!(worker = label, %chunk, "spawning worker process");
    let status = command
        .for_chunk(chunk, batch_size, label, plan_json)
        .status()
        .with_context(|| format!("spawn {} for {label}", command.program().display()))?;
    if status.success() {
        Ok(())
    } else {
        Err(PipelineError::Worker {
            label: label.to_string(),
            reason: format!("child exited with {status}"),
        }
        .into())
    }
}

/// Entry point of a child worker process: rebuild the plan and run one chunk.
///
/// # Errors
/// Returns any setup, I/O or stage error; the caller turns it into a
/// non-zero exit status.
pub fn worker_main(
    file_name: &Path,
    start: u64,
    end: u64,
    batch_size: usize,
    label: &str,
    plan_json: &str,
) -> Result<WorkerReport> {
    let plan = PipelinePlan::from_json(plan_json)?;
    let chunk = Chunk::new(file_name, start, end)?;
    let (stages, contexts) = plan.factories();
    process_chunk(&stages, &contexts, &chunk, batch_size, label, &PathLocks::new())
}
