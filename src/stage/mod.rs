//! The stage contract and the built-in stages.
//!
//! A stage transforms one [`Batch`] into the next and follows a strict
//! lifecycle, driven by the [worker](crate::worker):
//!
//! 1. [`initialize`](Stage::initialize) once, in pipeline order, with the
//!    stage's position as `stage_id`;
//! 2. [`process_batch`](Stage::process_batch) once per batch, in order;
//! 3. [`shutdown`](Stage::shutdown) once, in reverse order, after the last batch.
//!
//! Only the `successes` of the incoming batch are work items. A stage that
//! wants earlier failures to keep flowing copies them with
//! [`StageResult::forward_failures_from`](crate::result::StageResult::forward_failures_from).
//!
//! A stage returning `None` from `process_batch` is a terminal consumer. It
//! must say so through [`is_consumer`](Stage::is_consumer), and it must be the
//! last stage of the pipeline.
//!
//! Stages are built by factories ([`StageFactory`]) so every worker gets its
//! own instances; nothing is shared between workers except the
//! [`PathLocks`] registry.

pub mod context;
pub mod edition_fields;
pub mod edition_language;
#[cfg(feature = "io-jsonl")]
pub mod jsonl_sink;
pub mod persist;
pub mod summary;

pub use context::{BaseContext, LanguageContext, PipelineContext, downcast_context};
pub use edition_fields::EditionFieldValidation;
pub use edition_language::EditionLanguageValidation;
#[cfg(feature = "io-jsonl")]
pub use jsonl_sink::JsonlSink;
pub use persist::PersistStage;
pub use summary::SummaryStage;

use crate::locks::PathLocks;
use crate::record::DomainRecord;
use crate::result::{RecordFailure, StageResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// What flows between stages.
pub type Batch = StageResult<DomainRecord, RecordFailure>;

/// Builds a fresh stage instance for one worker.
pub type StageFactory = Arc<dyn Fn() -> Box<dyn Stage> + Send + Sync>;

/// Builds a fresh context instance for one worker.
pub type ContextFactory = Arc<dyn Fn() -> Box<dyn PipelineContext> + Send + Sync>;

/// Returned by [`Stage::initialize`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    pub stage_id: usize,
    pub stage_name: String,
}

impl StageConfig {
    pub fn new(stage_id: usize, stage_name: impl Into<String>) -> Self {
        Self {
            stage_id,
            stage_name: stage_name.into(),
        }
    }
}

pub trait Stage {
    fn name(&self) -> &str;

    /// Prepare the stage. Fails with a configuration error if `ctx` is not
    /// the context type the stage expects.
    fn initialize(&mut self, stage_id: usize, ctx: &dyn PipelineContext) -> Result<StageConfig>;

    /// Transform one batch. `Ok(None)` marks a terminal consumer.
    fn process_batch(&mut self, input: Batch, ctx: &dyn PipelineContext) -> Result<Option<Batch>>;

    fn shutdown(&mut self, ctx: &dyn PipelineContext) -> Result<()>;

    /// Whether this stage consumes batches without producing output.
    fn is_consumer(&self) -> bool {
        false
    }
}

/// Wrap a stage constructor as a [`StageFactory`].
pub fn stage_factory<S, F>(f: F) -> StageFactory
where
    S: Stage + 'static,
    F: Fn() -> S + Send + Sync + 'static,
{
    Arc::new(move || Box::new(f()) as Box<dyn Stage>)
}

/// Wrap a context constructor as a [`ContextFactory`].
pub fn context_factory<C, F>(f: F) -> ContextFactory
where
    C: PipelineContext,
    F: Fn() -> C + Send + Sync + 'static,
{
    Arc::new(move || Box::new(f()) as Box<dyn PipelineContext>)
}

/// A [`ContextFactory`] producing plain [`BaseContext`]s.
pub fn base_context_factory() -> ContextFactory {
    context_factory(BaseContext::new)
}

/// Append `text` and a newline to `path`, serialized through `locks`.
///
/// Parent directories are created as needed.
///
/// # Errors
/// Returns an error if the directories or the file cannot be written.
pub fn write_shutdown_info(locks: &PathLocks, path: impl AsRef<Path>, text: &str) -> Result<()> {
    let path = path.as_ref();
    locks.with_lock(path, || {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open {} for append", path.display()))?;
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        f.write_all(line.as_bytes())
            .with_context(|| format!("append shutdown info to {}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn concurrent_shutdown_writes_do_not_interleave() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/info.txt");
        let locks = PathLocks::new();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let locks = locks.clone();
                let path = path.clone();
                thread::spawn(move || write_shutdown_info(&locks, &path, &format!("worker-{i}")))
            })
            .collect();
        for h in handles {
            h.join().expect("writer thread panicked")?;
        }

        let text = std::fs::read_to_string(&path)?;
        let mut lines: Vec<_> = text.lines().collect();
        lines.sort();
        assert_eq!(lines.len(), 8);
        assert!(lines.iter().all(|l| l.starts_with("worker-")));
        Ok(())
    }
}
