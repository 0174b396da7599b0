use super::context::{LanguageContext, downcast_context};
use super::{Batch, PipelineContext, Stage, StageConfig};
use crate::record::{DomainRecord, Record};
use crate::result::{RecordFailure, StageResult};
use anyhow::Result;
use std::collections::HashSet;

/// Keeps editions written in an accepted language.
///
/// Requires a [`LanguageContext`]. Editions without any language are always
/// rejected, even with `any_language`.
#[derive(Debug, Default)]
pub struct EditionLanguageValidation {
    accepted: HashSet<String>,
    any_language: bool,
}

impl EditionLanguageValidation {
    pub const NAME: &'static str = "Edition language";

    pub fn new() -> Self {
        Self::default()
    }

    fn check(&self, languages: &[String]) -> Option<String> {
        if languages.is_empty() {
            return Some("edition has no language".to_string());
        }
        if self.any_language || languages.iter().any(|l| self.accepted.contains(l)) {
            return None;
        }
        Some(format!("languages [{}] not accepted", languages.join(", ")))
    }
}

impl Stage for EditionLanguageValidation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&mut self, stage_id: usize, ctx: &dyn PipelineContext) -> Result<StageConfig> {
        let ctx = downcast_context::<LanguageContext>(ctx, Self::NAME)?;
        self.accepted = ctx.languages.iter().cloned().collect();
        self.any_language = ctx.any_language;
        tracing::debug!(
            stage_id,
            any_language = self.any_language,
            languages = ?ctx.languages,
            "language filter ready"
        );
        Ok(StageConfig::new(stage_id, Self::NAME))
    }

    fn process_batch(&mut self, mut input: Batch, _ctx: &dyn PipelineContext) -> Result<Option<Batch>> {
        let mut out = StageResult::new(Self::NAME, "");
        for record in input.take_success_values() {
            let rejection = match &record {
                DomainRecord::Edition(edition) => self.check(&edition.languages),
                other => Some(format!("expected an edition, got {}", other.kind())),
            };
            match rejection {
                None => out.add_ok(record),
                Some(msg) => out.add_err(RecordFailure::new(Self::NAME, msg).with_record(record.id())),
            }
        }
        out.details = format!("{} of {} editions accepted", out.successes().len(), out.len());
        Ok(Some(out))
    }

    fn shutdown(&mut self, _ctx: &dyn PipelineContext) -> Result<()> {
        Ok(())
    }
}
