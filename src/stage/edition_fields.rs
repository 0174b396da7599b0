use super::{Batch, PipelineContext, Stage, StageConfig};
use crate::record::{DomainRecord, EditionRecord, Record};
use crate::result::{RecordFailure, StageResult};
use anyhow::Result;

/// Rejects editions missing the fields later stages rely on.
///
/// An edition passes when it has a non-empty id, ocaid and title, and at
/// least one of a publishing date, a copyright date or an author.
#[derive(Debug, Default)]
pub struct EditionFieldValidation {
    stage_id: usize,
}

impl EditionFieldValidation {
    pub const NAME: &'static str = "Edition fields";

    pub fn new() -> Self {
        Self::default()
    }
}

/// Names of the requirements `edition` breaks, empty when it is valid.
pub fn missing_fields(edition: &EditionRecord) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if edition.id.is_empty() {
        missing.push("id");
    }
    if edition.ocaid.is_empty() {
        missing.push("ocaid");
    }
    if edition.title.is_empty() {
        missing.push("title");
    }
    if edition.publishing_date == -1 && edition.copyright_date == -1 && edition.authors.is_empty()
    {
        missing.push("publishing_date|copyright_date|authors");
    }
    missing
}

impl Stage for EditionFieldValidation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&mut self, stage_id: usize, _ctx: &dyn PipelineContext) -> Result<StageConfig> {
        self.stage_id = stage_id;
        Ok(StageConfig::new(stage_id, Self::NAME))
    }

    fn process_batch(&mut self, mut input: Batch, _ctx: &dyn PipelineContext) -> Result<Option<Batch>> {
        let mut out = StageResult::new(Self::NAME, "");
        for record in input.take_success_values() {
            let rejection = match &record {
                DomainRecord::Edition(edition) => {
                    let missing = missing_fields(edition);
                    (!missing.is_empty()).then(|| format!("missing {}", missing.join(", ")))
                }
                other => Some(format!("expected an edition, got {}", other.kind())),
            };
            match rejection {
                None => out.add_ok(record),
                Some(msg) => out.add_err(RecordFailure::new(Self::NAME, msg).with_record(record.id())),
            }
        }
        out.details = format!("{} of {} editions valid", out.successes().len(), out.len());
        Ok(Some(out))
    }

    fn shutdown(&mut self, _ctx: &dyn PipelineContext) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_or_author_is_enough() {
        let mut e = EditionRecord::new("OL1M", "Title");
        e.ocaid = "ia1".into();
        assert_eq!(missing_fields(&e), vec!["publishing_date|copyright_date|authors"]);
        e.authors.push("OL1A".into());
        assert!(missing_fields(&e).is_empty());
    }
}
