//! Serializable description of a worker pipeline.
//!
//! Closures cannot cross a process boundary, so the process dispatcher hands
//! each child a [`PipelinePlan`] instead: a list of built-in stage kinds with
//! their settings. Both the parent (thread mode) and the children rebuild the
//! same factory lists from it with [`PipelinePlan::factories`].
//!
//! ```
//! use dumpbeam::plan::PipelinePlan;
//!
//! let plan = PipelinePlan::from_json(r#"{
//!     "stages": [
//!         {"stage": "edition_fields"},
//!         {"stage": "edition_language", "languages": ["eng"],
//!          "failure_policy": {"max_failure_ratio": 0.9}},
//!         {"stage": "summary", "path": "out/summary-{worker}.jsonl"}
//!     ]
//! }"#)?;
//! let (stages, contexts) = plan.factories();
//! assert_eq!(stages.len(), 3);
//! assert_eq!(contexts.len(), 3);
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::error::PipelineError;
use crate::result::FailurePolicy;
use crate::stage::{
    BaseContext, ContextFactory, EditionFieldValidation, EditionLanguageValidation,
    LanguageContext, StageFactory, SummaryStage, context_factory, stage_factory,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelinePlan {
    #[serde(default)]
    pub stages: Vec<StageSpec>,
}

/// One stage of a plan, with an optional escalation policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    #[serde(flatten)]
    pub kind: StageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_policy: Option<FailurePolicy>,
}

/// Built-in stages that can be named in a plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageKind {
    EditionFields,
    EditionLanguage {
        #[serde(default = "default_languages")]
        languages: Vec<String>,
        #[serde(default)]
        any_language: bool,
    },
    Summary {
        path: String,
    },
    #[cfg(feature = "io-jsonl")]
    JsonlSink {
        path: String,
    },
}

fn default_languages() -> Vec<String> {
    LanguageContext::default().languages
}

impl StageKind {
    pub fn is_consumer(&self) -> bool {
        match self {
            #[cfg(feature = "io-jsonl")]
            Self::JsonlSink { .. } => true,
            _ => false,
        }
    }
}

impl From<StageKind> for StageSpec {
    fn from(kind: StageKind) -> Self {
        Self {
            kind,
            failure_policy: None,
        }
    }
}

impl StageSpec {
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = Some(policy);
        self
    }

    pub fn stage_factory(&self) -> StageFactory {
        match self.kind.clone() {
            StageKind::EditionFields => stage_factory(EditionFieldValidation::new),
            StageKind::EditionLanguage { .. } => stage_factory(EditionLanguageValidation::new),
            StageKind::Summary { path } => stage_factory(move || SummaryStage::new(path.clone())),
            #[cfg(feature = "io-jsonl")]
            StageKind::JsonlSink { path } => {
                stage_factory(move || crate::stage::JsonlSink::new(path.clone()))
            }
        }
    }

    pub fn context_factory(&self) -> ContextFactory {
        let policy = self.failure_policy;
        match &self.kind {
            StageKind::EditionLanguage {
                languages,
                any_language,
            } => {
                let languages = languages.clone();
                let any_language = *any_language;
                context_factory(move || {
                    let mut ctx = LanguageContext::new(languages.clone());
                    ctx.any_language = any_language;
                    ctx.base.set_failure_policy(policy);
                    ctx
                })
            }
            _ => context_factory(move || {
                let mut ctx = BaseContext::new();
                ctx.set_failure_policy(policy);
                ctx
            }),
        }
    }
}

impl PipelinePlan {
    pub fn new(stages: impl IntoIterator<Item = StageSpec>) -> Self {
        Self {
            stages: stages.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn then(mut self, stage: impl Into<StageSpec>) -> Self {
        self.stages.push(stage.into());
        self
    }

    /// The plan written by `generate-config`.
    pub fn sample() -> Self {
        Self::default()
            .then(StageKind::EditionFields)
            .then(StageKind::EditionLanguage {
                languages: default_languages(),
                any_language: false,
            })
            .then(StageKind::Summary {
                path: "out/summary.jsonl".to_string(),
            })
    }

    /// Check that only the last stage is a consumer.
    ///
    /// # Errors
    /// Returns [`PipelineError::Config`] naming the misplaced stage.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let last = self.stages.len().saturating_sub(1);
        for (i, stage) in self.stages.iter().enumerate() {
            if stage.kind.is_consumer() && i != last {
                return Err(PipelineError::config(format!(
                    "consumer stage at position {i} must be the last stage"
                )));
            }
            if let Some(p) = &stage.failure_policy
                && !(0.0..=1.0).contains(&p.max_failure_ratio)
            {
                return Err(PipelineError::config(format!(
                    "stage {i}: max_failure_ratio {} is outside [0, 1]",
                    p.max_failure_ratio
                )));
            }
        }
        Ok(())
    }

    /// Positional stage and context factory lists.
    pub fn factories(&self) -> (Vec<StageFactory>, Vec<ContextFactory>) {
        self.stages
            .iter()
            .map(|s| (s.stage_factory(), s.context_factory()))
            .unzip()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let plan: Self = serde_json::from_str(json).context("parse pipeline plan")?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("serialize pipeline plan")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_defaults_apply() -> Result<()> {
        let plan = PipelinePlan::from_json(r#"{"stages":[{"stage":"edition_language"}]}"#)?;
        assert_eq!(
            plan.stages[0].kind,
            StageKind::EditionLanguage {
                languages: vec!["eng".into(), "ger".into()],
                any_language: false
            }
        );
        Ok(())
    }

    #[test]
    fn json_round_trip_keeps_policy() -> Result<()> {
        let plan = PipelinePlan::default().then(
            StageSpec::from(StageKind::EditionFields)
                .with_failure_policy(FailurePolicy::max_ratio(0.5)),
        );
        assert_eq!(PipelinePlan::from_json(&plan.to_json()?)?, plan);
        Ok(())
    }

    #[cfg(feature = "io-jsonl")]
    #[test]
    fn misplaced_consumer_is_rejected() {
        let json = r#"{"stages":[{"stage":"jsonl_sink","path":"a"},{"stage":"edition_fields"}]}"#;
        assert!(PipelinePlan::from_json(json).is_err());
    }
}
