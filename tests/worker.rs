use anyhow::Result;
use dumpbeam::io::jsonl::read_jsonl_vec;
use dumpbeam::repository::{InMemoryRepository, Repository};
use dumpbeam::stage::summary::RunSummary;
use dumpbeam::stage::{
    BaseContext, EditionFieldValidation, EditionLanguageValidation, JsonlSink, LanguageContext,
    PersistStage, SummaryStage, base_context_factory, context_factory, stage_factory,
};
use dumpbeam::testing::*;
use dumpbeam::{
    ContextFactory, DomainRecord, FailurePolicy, PathLocks, PipelineError, StageFactory,
    WorkerPipeline, run_worker,
};
use serde_json::Value;
use std::sync::Arc;

fn recording(stage: RecordingStage) -> StageFactory {
    stage_factory(move || stage.clone())
}

fn contexts(n: usize) -> Vec<ContextFactory> {
    (0..n).map(|_| base_context_factory()).collect()
}

fn pipeline_error(err: &anyhow::Error) -> Option<&PipelineError> {
    err.chain().find_map(|e| e.downcast_ref::<PipelineError>())
}

#[test]
fn lifecycle_runs_in_order_and_shuts_down_in_reverse() -> Result<()> {
    let dump = DumpFixture::new(&edition_lines(5))?;
    let log = EventLog::new();
    let stages = vec![
        recording(RecordingStage::new("a", &log)),
        recording(RecordingStage::new("b", &log)),
    ];
    run_worker(dump.path(), 0, dump.size()?, 2, &stages, &contexts(2))?;

    assert_eq!(
        log.events(),
        vec![
            "init:a:0", "init:b:1", "batch:a:2", "batch:b:2", "batch:a:2", "batch:b:2",
            "batch:a:1", "batch:b:1", "shutdown:b", "shutdown:a",
        ]
    );
    Ok(())
}

#[test]
fn failing_shutdown_does_not_stop_other_shutdowns() -> Result<()> {
    let dump = DumpFixture::new(&edition_lines(3))?;
    let log = EventLog::new();
    let stages = vec![
        recording(RecordingStage::new("first", &log)),
        recording(RecordingStage::new("second", &log).failing_shutdown()),
        recording(RecordingStage::new("third", &log).failing_shutdown()),
    ];
    let report = WorkerPipeline::build("w", &PathLocks::new(), &stages, &contexts(3))?
        .run(dump.path(), 0, dump.size()?, 10)?;

    assert_eq!(report.failed_shutdowns, 2);
    assert_eq!(
        log.matching("shutdown:"),
        vec!["shutdown:third", "shutdown:second", "shutdown:first"]
    );
    Ok(())
}

#[test]
fn mismatched_factory_lists_are_rejected_before_reading() -> Result<()> {
    let log = EventLog::new();
    let stages = vec![recording(RecordingStage::new("a", &log))];
    let err = run_worker("/no/such/file", 0, 10, 5, &stages, &contexts(2)).unwrap_err();

    assert!(matches!(pipeline_error(&err), Some(PipelineError::Config(_))));
    assert!(log.events().is_empty());
    Ok(())
}

#[test]
fn consumer_must_be_last() {
    let log = EventLog::new();
    let stages = vec![
        recording(RecordingStage::new("sink", &log).consumer()),
        recording(RecordingStage::new("after", &log)),
    ];
    let err = WorkerPipeline::build("w", &PathLocks::new(), &stages, &contexts(2)).unwrap_err();
    assert!(matches!(pipeline_error(&err), Some(PipelineError::Config(_))));
    assert!(log.events().is_empty(), "no stage may be initialized");
}

#[test]
fn init_failure_shuts_down_initialized_stages() {
    let log = EventLog::new();
    let stages = vec![
        recording(RecordingStage::new("ok", &log)),
        recording(RecordingStage::new("bad", &log).failing_init()),
        recording(RecordingStage::new("never", &log)),
    ];
    let err = WorkerPipeline::build("w", &PathLocks::new(), &stages, &contexts(3)).unwrap_err();

    assert!(matches!(pipeline_error(&err), Some(PipelineError::Config(_))));
    assert_eq!(log.events(), vec!["init:ok:0", "init:bad:1", "shutdown:ok"]);
}

#[test]
fn wrong_context_type_is_a_config_error() {
    let stages = vec![stage_factory(EditionLanguageValidation::new)];
    let err = WorkerPipeline::build("w", &PathLocks::new(), &stages, &contexts(1)).unwrap_err();
    assert!(matches!(pipeline_error(&err), Some(PipelineError::Config(_))));
}

#[test]
fn has_failed_aborts_the_worker_after_shutdown() -> Result<()> {
    let dump = DumpFixture::new(&edition_lines(6))?;
    let log = EventLog::new();
    let stages = vec![
        recording(RecordingStage::new("broken", &log).marking_failed()),
        recording(RecordingStage::new("downstream", &log)),
    ];
    let err = run_worker(dump.path(), 0, dump.size()?, 2, &stages, &contexts(2)).unwrap_err();

    assert!(matches!(
        pipeline_error(&err),
        Some(PipelineError::StageFailed { stage_id: 0, .. })
    ));
    assert!(log.matching("batch:downstream").is_empty());
    assert_eq!(log.matching("shutdown:"), vec!["shutdown:downstream", "shutdown:broken"]);
    Ok(())
}

#[test]
fn undeclared_consumer_cannot_end_the_fold() -> Result<()> {
    let dump = DumpFixture::new(&edition_lines(4))?;
    let log = EventLog::new();
    let stages = vec![
        recording(RecordingStage::new("silent", &log).dropping_output()),
        recording(RecordingStage::new("after", &log)),
    ];
    let err = run_worker(dump.path(), 0, dump.size()?, 2, &stages, &contexts(2)).unwrap_err();

    assert!(matches!(pipeline_error(&err), Some(PipelineError::Config(_))));
    assert!(log.matching("batch:after").is_empty());
    assert_eq!(log.matching("shutdown:"), vec!["shutdown:after", "shutdown:silent"]);
    Ok(())
}

#[test]
fn failure_policy_escalates_record_failures() -> Result<()> {
    // Every record is an author, so the edition check rejects all of them.
    let lines: Vec<String> = (1..=4).map(|i| author_line(i, r#"{"name":"A"}"#)).collect();
    let dump = DumpFixture::new(&lines)?;

    let lenient = vec![stage_factory(EditionFieldValidation::new)];
    run_worker(dump.path(), 0, dump.size()?, 2, &lenient, &contexts(1))?;

    let strict_ctx = vec![context_factory(|| {
        BaseContext::new().with_failure_policy(FailurePolicy::max_ratio(0.5))
    })];
    let err = run_worker(dump.path(), 0, dump.size()?, 2, &lenient, &strict_ctx).unwrap_err();
    assert!(matches!(pipeline_error(&err), Some(PipelineError::StageFailed { .. })));
    Ok(())
}

#[test]
fn no_stages_still_drains_the_stream() -> Result<()> {
    let dump = DumpFixture::new(&sample_dump_lines())?;
    let report = WorkerPipeline::build("empty", &PathLocks::new(), &[], &[])?
        .run(dump.path(), 0, dump.size()?, 3)?;
    assert_eq!(report.records, 7);
    assert_eq!(report.batches, 3);
    Ok(())
}

#[test]
fn zero_batch_size_is_rejected() {
    let err = run_worker("/no/such/file", 0, 10, 0, &[], &[]).unwrap_err();
    assert!(matches!(pipeline_error(&err), Some(PipelineError::Config(_))));
}

#[test]
fn io_errors_are_fatal() {
    let err = run_worker("/no/such/file", 0, 10, 5, &[], &[]).unwrap_err();
    assert!(matches!(pipeline_error(&err), Some(PipelineError::Io { .. })));
}

#[test]
fn built_in_stages_filter_and_write_outputs() -> Result<()> {
    let dump = DumpFixture::new(&sample_dump_lines())?;
    let summary_path = dump.dir().join("out/summary-{worker}.jsonl");
    let sink_path = dump.dir().join("out/editions.jsonl");
    let summary_path = summary_path.to_string_lossy().into_owned();
    let sink_path_str = sink_path.to_string_lossy().into_owned();

    let stages: Vec<StageFactory> = vec![
        stage_factory(EditionFieldValidation::new),
        stage_factory(EditionLanguageValidation::new),
        stage_factory(move || SummaryStage::new(summary_path.clone())),
        stage_factory(move || JsonlSink::new(sink_path_str.clone())),
    ];
    let contexts: Vec<ContextFactory> = vec![
        base_context_factory(),
        context_factory(LanguageContext::default),
        base_context_factory(),
        base_context_factory(),
    ];
    let report = WorkerPipeline::build("w0", &PathLocks::new(), &stages, &contexts)?
        .run(dump.path(), 0, dump.size()?, 4)?;
    assert_eq!(report.records, 7);

    let written: Vec<Value> = read_jsonl_vec(&sink_path)?;
    let ids: Vec<&str> = written.iter().filter_map(|v| v["ol_id"].as_str()).collect();
    assert_eq!(ids, vec!["OL1M", "OL2M", "OL5M"]);

    let summaries: Vec<RunSummary> = read_jsonl_vec(dump.dir().join("out/summary-w0.jsonl"))?;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].worker, "w0");
    assert_eq!(summaries[0].successes, 3);
    // Summary only sees the language stage's output: one French edition.
    assert_eq!(summaries[0].failures, 1);
    Ok(())
}

#[test]
fn persist_stage_stores_successes_once() -> Result<()> {
    let dump = DumpFixture::new(&edition_lines(5))?;
    let repo = Arc::new(InMemoryRepository::<DomainRecord>::new());

    for _ in 0..2 {
        let repo = Arc::clone(&repo);
        let stages = vec![stage_factory(move || {
            PersistStage::new(Arc::clone(&repo), vec!["ol_id".to_string()])
        })];
        run_worker(dump.path(), 0, dump.size()?, 2, &stages, &contexts(1))?;
    }

    assert_eq!(repo.len(), 5);
    assert!(repo.get_by_id(&"OL3M".to_string())?.is_some());
    Ok(())
}
