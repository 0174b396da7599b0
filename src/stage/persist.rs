use super::{Batch, PipelineContext, Stage, StageConfig};
use crate::record::DomainRecord;
use crate::repository::Repository;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Terminal consumer storing successes through a [`Repository`].
///
/// Values colliding on `conflict_keys` are skipped by the repository, so
/// re-running a chunk does not duplicate rows.
pub struct PersistStage<R> {
    repository: Arc<R>,
    conflict_keys: Vec<String>,
    inserted: usize,
    skipped: usize,
}

impl<R> PersistStage<R>
where
    R: Repository<DomainRecord, String>,
{
    pub const NAME: &'static str = "Persist";

    pub fn new(repository: Arc<R>, conflict_keys: Vec<String>) -> Self {
        Self {
            repository,
            conflict_keys,
            inserted: 0,
            skipped: 0,
        }
    }

    pub fn inserted(&self) -> usize {
        self.inserted
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<R> Stage for PersistStage<R>
where
    R: Repository<DomainRecord, String>,
{
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&mut self, stage_id: usize, _ctx: &dyn PipelineContext) -> Result<StageConfig> {
        Ok(StageConfig::new(stage_id, Self::NAME))
    }

    fn process_batch(&mut self, mut input: Batch, _ctx: &dyn PipelineContext) -> Result<Option<Batch>> {
        let values = input.take_success_values();
        let offered = values.len();
        let inserted = self
            .repository
            .create_many(values, &self.conflict_keys)
            .with_context(|| format!("persist batch of {offered} records"))?;
        self.inserted += inserted;
        self.skipped += offered.saturating_sub(inserted);
        Ok(None)
    }

    fn shutdown(&mut self, ctx: &dyn PipelineContext) -> Result<()> {
        tracing::info!(
            worker = ctx.base().worker_label(),
            inserted = self.inserted,
            skipped = self.skipped,
            "persisted records"
        );
        Ok(())
    }

    fn is_consumer(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EditionRecord;
    use crate::result::StageResult;
    use crate::stage::BaseContext;

    /// Claims more inserts than it was offered.
    struct OverReporting;

    impl Repository<DomainRecord, String> for OverReporting {
        fn create(&self, value: DomainRecord) -> Result<DomainRecord> {
            Ok(value)
        }

        fn create_many(&self, values: Vec<DomainRecord>, _keys: &[String]) -> Result<usize> {
            Ok(values.len() + 3)
        }

        fn get_by_id(&self, _id: &String) -> Result<Option<DomainRecord>> {
            Ok(None)
        }

        fn get_all(&self) -> Result<Vec<DomainRecord>> {
            Ok(Vec::new())
        }

        fn update(&self, _id: &String, _value: DomainRecord) -> Result<Option<DomainRecord>> {
            Ok(None)
        }

        fn delete(&self, _id: &String) -> Result<bool> {
            Ok(false)
        }
    }

    #[test]
    fn over_reported_inserts_do_not_underflow() -> Result<()> {
        let ctx = BaseContext::new();
        let mut stage = PersistStage::new(Arc::new(OverReporting), Vec::new());
        stage.initialize(0, &ctx)?;

        let mut batch: Batch = StageResult::new("test", "");
        batch.add_ok(EditionRecord::new("OL1M", "Title").into());
        assert!(stage.process_batch(batch, &ctx)?.is_none());

        assert_eq!(stage.inserted(), 4);
        assert_eq!(stage.skipped(), 0);
        Ok(())
    }
}
