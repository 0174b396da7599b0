use super::{Batch, PipelineContext, Stage, StageConfig};
use crate::io::jsonl::append_jsonl;
use crate::record::Record;
use anyhow::Result;
use serde_json::Value;

/// Terminal consumer appending every success as one JSON object per line.
///
/// `path` may contain `{worker}` to give each worker its own file. Appends to
/// a shared file are serialized through the context's lock registry.
#[derive(Debug)]
pub struct JsonlSink {
    path: String,
    written: u64,
}

impl JsonlSink {
    pub const NAME: &'static str = "JSONL sink";

    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl Stage for JsonlSink {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&mut self, stage_id: usize, _ctx: &dyn PipelineContext) -> Result<StageConfig> {
        self.written = 0;
        Ok(StageConfig::new(stage_id, Self::NAME))
    }

    fn process_batch(&mut self, input: Batch, ctx: &dyn PipelineContext) -> Result<Option<Batch>> {
        let rows: Vec<Value> = input
            .success_values()
            .map(|r| Value::Object(r.as_dict()))
            .collect();
        let base = ctx.base();
        let path = base.resolve_path(&self.path);
        let n = base.locks().with_lock(&path, || append_jsonl(&path, &rows))?;
        self.written += n as u64;
        Ok(None)
    }

    fn shutdown(&mut self, ctx: &dyn PipelineContext) -> Result<()> {
        tracing::info!(
            worker = ctx.base().worker_label(),
            written = self.written,
            "jsonl sink closed"
        );
        Ok(())
    }

    fn is_consumer(&self) -> bool {
        true
    }
}
