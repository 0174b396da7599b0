//! Pass-through stage that counts what it sees and reports once at shutdown.

use super::{Batch, PipelineContext, Stage, StageConfig, write_shutdown_info};
use crate::record::RecordKind;
use crate::result::StageResult;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Totals accumulated by a [`SummaryStage`] over a worker's batches.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub worker: String,
    pub batches: u64,
    pub records: u64,
    pub successes: u64,
    pub failures: u64,
    pub by_kind: BTreeMap<RecordKind, u64>,
}

/// Forwards successes and earlier failures unchanged while counting them.
///
/// At shutdown the totals are appended as one JSON line to `path` (which may
/// contain `{worker}`) through [`write_shutdown_info`].
#[derive(Debug)]
pub struct SummaryStage {
    path: String,
    summary: RunSummary,
}

impl SummaryStage {
    pub const NAME: &'static str = "Summary";

    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            summary: RunSummary::default(),
        }
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }
}

impl Stage for SummaryStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&mut self, stage_id: usize, ctx: &dyn PipelineContext) -> Result<StageConfig> {
        self.summary = RunSummary {
            worker: ctx.base().worker_label().to_string(),
            ..RunSummary::default()
        };
        Ok(StageConfig::new(stage_id, Self::NAME))
    }

    fn process_batch(&mut self, mut input: Batch, _ctx: &dyn PipelineContext) -> Result<Option<Batch>> {
        let s = &mut self.summary;
        s.batches += 1;
        s.records += input.len() as u64;
        s.successes += input.successes().len() as u64;
        s.failures += input.failures().len() as u64;
        for record in input.success_values() {
            *s.by_kind.entry(record.kind()).or_default() += 1;
        }

        let mut out = StageResult::new(Self::NAME, input.details.clone());
        out.forward_failures_from(&mut input);
        for record in input.take_success_values() {
            out.add_ok(record);
        }
        Ok(Some(out))
    }

    fn shutdown(&mut self, ctx: &dyn PipelineContext) -> Result<()> {
        let base = ctx.base();
        let path = base.resolve_path(&self.path);
        let line = serde_json::to_string(&self.summary).context("serialize run summary")?;
        write_shutdown_info(base.locks(), &path, &line)?;
        tracing::info!(
            worker = %self.summary.worker,
            records = self.summary.records,
            failures = self.summary.failures,
            path = %path.display(),
            "summary written"
        );
        Ok(())
    }
}
