//! Per-chunk pipeline executor.
//!
//! A worker owns one instance of every stage and its context, streams the
//! records of its byte range in batches, parses each batch with the
//! [`EntryParser`] and folds the result through the stages in order:
//!
//! ```text
//! RecordStream ─▶ batched ─▶ EntryParser ─▶ stage 0 ─▶ stage 1 ─▶ … ─▶ stage n
//! ```
//!
//! Setup problems (mismatched factory lists, a misplaced consumer, a stage
//! refusing its context) are configuration errors reported before the first
//! record is read. Once running, a batch whose result is marked `has_failed`
//! aborts the worker. Either way every initialized stage is shut down, in
//! reverse order, exactly once.

use crate::error::PipelineError;
use crate::helpers::BatchExt;
use crate::io::dump::stream;
use crate::locks::PathLocks;
use crate::record::{EntryParser, TransportRecord};
use crate::stage::{Batch, ContextFactory, PipelineContext, Stage, StageFactory};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Counters logged when a worker finishes.
///
/// `successes` and `failures` are taken from the last result that reached
/// the end of the pipeline, or the input of the terminal consumer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub label: String,
    pub batches: u64,
    pub records: u64,
    pub successes: u64,
    pub failures: u64,
    pub failed_shutdowns: usize,
}

struct Slot {
    stage: Box<dyn Stage>,
    ctx: Box<dyn PipelineContext>,
}

/// The ordered, initialized `(stage, context)` pairs of one worker.
pub struct WorkerPipeline {
    label: String,
    slots: Vec<Slot>,
    parser: EntryParser,
}

impl std::fmt::Debug for WorkerPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPipeline")
            .field("label", &self.label)
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl WorkerPipeline {
    /// Instantiate, bind and initialize one stage per factory pair.
    ///
    /// # Errors
    /// Returns [`PipelineError::Config`] when the lists differ in length,
    /// when a consumer is not the last stage, or when a stage fails to
    /// initialize. Stages initialized before the failure are shut down.
    pub fn build(
        label: impl Into<String>,
        locks: &PathLocks,
        stage_factories: &[StageFactory],
        context_factories: &[ContextFactory],
    ) -> Result<Self> {
        let label = label.into();
        if stage_factories.len() != context_factories.len() {
            return Err(PipelineError::config(format!(
                "{} stage factories but {} context factories",
                stage_factories.len(),
                context_factories.len()
            ))
            .into());
        }

        let mut pending = Vec::with_capacity(stage_factories.len());
        for (make_stage, make_ctx) in stage_factories.iter().zip(context_factories) {
            let stage = make_stage();
            let mut ctx = make_ctx();
            ctx.base_mut().bind(label.clone(), locks.clone());
            pending.push(Slot { stage, ctx });
        }

        let last = pending.len().saturating_sub(1);
        if let Some((i, slot)) = pending
            .iter()
            .enumerate()
            .find(|(i, s)| s.stage.is_consumer() && *i != last)
        {
            return Err(PipelineError::config(format!(
                "consumer stage `{}` at position {i} must be the last stage",
                slot.stage.name()
            ))
            .into());
        }

        let mut pipeline = Self {
            label,
            slots: Vec::with_capacity(pending.len()),
            parser: EntryParser::default(),
        };
        for (stage_id, mut slot) in pending.into_iter().enumerate() {
            match slot.stage.initialize(stage_id, slot.ctx.as_ref()) {
                Ok(config) => {
                    tracing::debug!(
                        worker = %pipeline.label,
                        stage_id = config.stage_id,
                        stage = %config.stage_name,
                        "stage initialized"
                    );
                    pipeline.slots.push(slot);
                }
                Err(e) => {
                    let name = slot.stage.name().to_string();
                    pipeline.shutdown();
                    return Err(PipelineError::config(format!(
                        "stage {stage_id} (`{name}`) failed to initialize: {e:#}"
                    ))
                    .into());
                }
            }
        }
        Ok(pipeline)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.stage.name()).collect()
    }

    /// Stream `[start, end)` of `file_name` through the pipeline, then shut
    /// every stage down.
    ///
    /// # Errors
    /// I/O errors, stage errors and escalated stage failures abort the run.
    /// Shutdown errors are logged and counted in the report, never returned.
    pub fn run(
        mut self,
        file_name: impl AsRef<Path>,
        start: u64,
        end: u64,
        batch_size: usize,
    ) -> Result<WorkerReport> {
        let span = tracing::info_span!("worker", label = %self.label);
        let _entered = span.enter();

        let mut report = WorkerReport {
            label: self.label.clone(),
            ..WorkerReport::default()
        };
        let outcome = self.drive(file_name.as_ref(), start, end, batch_size, &mut report);
        report.failed_shutdowns = self.shutdown();
        outcome?;

        tracing::info!(
            batches = report.batches,
            records = report.records,
            successes = report.successes,
            failures = report.failures,
            failed_shutdowns = report.failed_shutdowns,
            "worker finished"
        );
        Ok(report)
    }

    fn drive(
        &mut self,
        file_name: &Path,
        start: u64,
        end: u64,
        batch_size: usize,
        report: &mut WorkerReport,
    ) -> Result<()> {
        let batches = stream(file_name, start, end)?.batches(batch_size)?;
        for batch in batches {
            let records: Vec<TransportRecord> = batch
                .into_iter()
                .collect::<Result<_>>()
                .with_context(|| format!("read batch {} of {}", report.batches + 1, self.label))?;
            report.batches += 1;
            report.records += records.len() as u64;

            let (successes, failures) = self.process(records)?;
            report.successes += successes as u64;
            report.failures += failures as u64;
        }
        Ok(())
    }

    /// Parse one batch and fold it through every stage.
    ///
    /// Returns the success and failure counts of the final result (or of the
    /// consumer's input).
    fn process(&mut self, records: Vec<TransportRecord>) -> Result<(usize, usize)> {
        let mut current: Batch = self.parser.parse_batch(records);
        for (stage_id, slot) in self.slots.iter_mut().enumerate() {
            let counts = (current.successes().len(), current.failures().len());
            let next = slot
                .stage
                .process_batch(current, slot.ctx.as_ref())
                .with_context(|| format!("stage {stage_id} (`{}`)", slot.stage.name()))?;
            let Some(mut next) = next else {
                // Only a declared consumer may end the fold; it is last by construction.
                if !slot.stage.is_consumer() {
                    return Err(PipelineError::config(format!(
                        "stage {stage_id} (`{}`) returned no output but is not the terminal consumer",
                        slot.stage.name()
                    ))
                    .into());
                }
                return Ok(counts);
            };
            if let Some(policy) = slot.ctx.base().failure_policy() {
                policy.apply(&mut next);
            }
            if next.has_failed() {
                return Err(PipelineError::StageFailed {
                    stage_id,
                    stage_name: slot.stage.name().to_string(),
                    details: next.to_string(),
                }
                .into());
            }
            current = next;
        }
        Ok((current.successes().len(), current.failures().len()))
    }

    /// Shut every stage down in reverse order, logging failures.
    ///
    /// Returns the number of stages whose shutdown failed. Stages are
    /// removed, so calling this twice is a no-op.
    fn shutdown(&mut self) -> usize {
        let mut failed = 0;
        while let Some(mut slot) = self.slots.pop() {
            let stage_id = self.slots.len();
            if let Err(e) = slot.stage.shutdown(slot.ctx.as_ref()) {
                failed += 1;
                tracing::warn!(
                    worker = %self.label,
                    stage_id,
                    stage = slot.stage.name(),
                    "stage shutdown failed: {e:#}"
                );
            }
        }
        failed
    }
}

/// Build a pipeline from the factory lists and run it over one byte range.
///
/// The worker label is derived from the range. Use [`WorkerPipeline::build`]
/// directly to choose a label or share a lock registry.
///
/// # Errors
/// See [`WorkerPipeline::build`] and [`WorkerPipeline::run`].
pub fn run_worker(
    file_name: impl AsRef<Path>,
    chunk_start: u64,
    chunk_end: u64,
    batch_size: usize,
    stage_factories: &[StageFactory],
    context_factories: &[ContextFactory],
) -> Result<()> {
    if batch_size == 0 {
        return Err(PipelineError::config("batch size must be at least 1").into());
    }
    let label = format!("{chunk_start}-{chunk_end}");
    let pipeline = WorkerPipeline::build(label, &PathLocks::new(), stage_factories, context_factories)?;
    pipeline.run(file_name, chunk_start, chunk_end, batch_size)?;
    Ok(())
}
