//! Instrumented stages for exercising the worker lifecycle.

use crate::record::Record;
use crate::result::StageResult;
use crate::stage::{Batch, PipelineContext, Stage, StageConfig};
use anyhow::{Result, bail};
use std::sync::{Arc, Mutex, PoisonError};

/// Shared, ordered log of lifecycle events.
///
/// Events read `init:<name>:<stage_id>`, `batch:<name>:<len>` and
/// `shutdown:<name>`.
#[derive(Clone, Debug, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Events starting with `prefix`, e.g. `"shutdown:"`.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }
}

/// Pass-through stage that records every lifecycle call.
///
/// Successes and failures are forwarded unchanged. Builder methods turn it
/// into a consumer or make one of its lifecycle calls fail.
#[derive(Debug, Clone)]
pub struct RecordingStage {
    name: String,
    log: EventLog,
    consumer: bool,
    fail_init: bool,
    fail_shutdown: bool,
    mark_failed: bool,
    drop_output: bool,
    panic_on: Option<String>,
}

impl RecordingStage {
    pub fn new(name: impl Into<String>, log: &EventLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            consumer: false,
            fail_init: false,
            fail_shutdown: false,
            mark_failed: false,
            drop_output: false,
            panic_on: None,
        }
    }

    /// Return `None` from every batch.
    #[must_use]
    pub fn consumer(mut self) -> Self {
        self.consumer = true;
        self
    }

    #[must_use]
    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    #[must_use]
    pub fn failing_shutdown(mut self) -> Self {
        self.fail_shutdown = true;
        self
    }

    /// Mark every output result as catastrophically failed.
    #[must_use]
    pub fn marking_failed(mut self) -> Self {
        self.mark_failed = true;
        self
    }

    /// Return `None` from every batch without declaring itself a consumer.
    #[must_use]
    pub fn dropping_output(mut self) -> Self {
        self.drop_output = true;
        self
    }

    /// Panic when a batch holds the record `id` (e.g. `OL1M`).
    #[must_use]
    pub fn panicking_on(mut self, id: impl Into<String>) -> Self {
        self.panic_on = Some(id.into());
        self
    }
}

impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, stage_id: usize, _ctx: &dyn PipelineContext) -> Result<StageConfig> {
        self.log.push(format!("init:{}:{stage_id}", self.name));
        if self.fail_init {
            bail!("{} refused to initialize", self.name);
        }
        Ok(StageConfig::new(stage_id, self.name.clone()))
    }

    fn process_batch(&mut self, mut input: Batch, _ctx: &dyn PipelineContext) -> Result<Option<Batch>> {
        self.log.push(format!("batch:{}:{}", self.name, input.len()));
        if let Some(id) = &self.panic_on
            && input.success_values().any(|r| r.id() == id.as_str())
        {
            panic!("{} hit record {id}", self.name);
        }
        if self.consumer || self.drop_output {
            return Ok(None);
        }
        let mut out = StageResult::new(self.name.clone(), input.details.clone());
        out.forward_failures_from(&mut input);
        for record in input.take_success_values() {
            out.add_ok(record);
        }
        out.mark_failed(self.mark_failed);
        Ok(Some(out))
    }

    fn shutdown(&mut self, _ctx: &dyn PipelineContext) -> Result<()> {
        self.log.push(format!("shutdown:{}", self.name));
        if self.fail_shutdown {
            bail!("{} failed to shut down", self.name);
        }
        Ok(())
    }

    fn is_consumer(&self) -> bool {
        self.consumer
    }
}
