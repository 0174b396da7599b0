//! Per-stage configuration objects.
//!
//! Every worker builds one context per stage from a [`ContextFactory`](super::ContextFactory).
//! All contexts embed a [`BaseContext`]; stage-specific contexts add their own
//! fields and are recovered by the stage with [`downcast_context`].

use crate::error::PipelineError;
use crate::locks::PathLocks;
use crate::result::FailurePolicy;
use std::any::Any;
use std::path::PathBuf;

/// Placeholder replaced by the worker label in output paths.
pub const WORKER_PLACEHOLDER: &str = "{worker}";

/// Configuration handed to a stage at every lifecycle call.
pub trait PipelineContext: Any {
    fn base(&self) -> &BaseContext;
    fn base_mut(&mut self) -> &mut BaseContext;
    fn as_any(&self) -> &dyn Any;
}

/// Fields shared by every context. The worker fills in the label and the
/// lock registry before the stage is initialized.
#[derive(Clone, Debug, Default)]
pub struct BaseContext {
    worker_label: String,
    locks: PathLocks,
    failure_policy: Option<FailurePolicy>,
}

impl BaseContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = Some(policy);
        self
    }

    pub fn worker_label(&self) -> &str {
        &self.worker_label
    }

    pub fn locks(&self) -> &PathLocks {
        &self.locks
    }

    pub fn failure_policy(&self) -> Option<&FailurePolicy> {
        self.failure_policy.as_ref()
    }

    pub fn set_failure_policy(&mut self, policy: Option<FailurePolicy>) {
        self.failure_policy = policy;
    }

    /// Attach the context to a worker.
    pub fn bind(&mut self, worker_label: impl Into<String>, locks: PathLocks) {
        self.worker_label = worker_label.into();
        self.locks = locks;
    }

    /// Substitute `{worker}` in `path` with this worker's label.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        PathBuf::from(path.replace(WORKER_PLACEHOLDER, &self.worker_label))
    }
}

impl PipelineContext for BaseContext {
    fn base(&self) -> &BaseContext {
        self
    }

    fn base_mut(&mut self) -> &mut BaseContext {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Allow-list for [`EditionLanguageValidation`](super::EditionLanguageValidation).
#[derive(Clone, Debug)]
pub struct LanguageContext {
    pub base: BaseContext,
    /// Accepted language codes, e.g. `eng`.
    pub languages: Vec<String>,
    /// Accept any edition that declares at least one language.
    pub any_language: bool,
}

impl Default for LanguageContext {
    fn default() -> Self {
        Self {
            base: BaseContext::default(),
            languages: vec!["eng".to_string(), "ger".to_string()],
            any_language: false,
        }
    }
}

impl LanguageContext {
    pub fn new<I, S>(languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            languages: languages.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn any_language() -> Self {
        Self {
            any_language: true,
            ..Self::default()
        }
    }
}

impl PipelineContext for LanguageContext {
    fn base(&self) -> &BaseContext {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseContext {
        &mut self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Recover the concrete context a stage expects.
///
/// # Errors
/// Returns [`PipelineError::Config`] naming `stage` when the context has a
/// different type.
pub fn downcast_context<'a, C: PipelineContext>(
    ctx: &'a dyn PipelineContext,
    stage: &str,
) -> Result<&'a C, PipelineError> {
    ctx.as_any().downcast_ref::<C>().ok_or_else(|| {
        PipelineError::config(format!(
            "stage `{stage}` requires a {} context",
            std::any::type_name::<C>().rsplit("::").next().unwrap_or("specific")
        ))
    })
}
