//! Partial results of a stage over one batch.
//!
//! A batch rarely succeeds or fails as a whole: some records normalize cleanly,
//! others are rejected. [`StageResult`] keeps both sides of that split:
//!
//! - [`Success<T>`] wraps a record that made it through the stage,
//! - [`Failure<E>`] wraps the reason a record did not,
//! - `has_failed` is a separate, catastrophic flag for "the stage itself could
//!   not run". A non-empty failure list never implies it.
//!
//! Across the pipeline boundary the error type is [`RecordFailure`], so no
//! stage needs to branch on error shape.
//!
//! # Example
//! ```
//! use dumpbeam::result::{RecordFailure, StageResult};
//!
//! let mut r: StageResult<u32, RecordFailure> = StageResult::new("double", "doubles values");
//! r.add_ok(2);
//! r.add_err(RecordFailure::new("double", "odd input").with_record("OL1M"));
//! assert_eq!(r.len(), 2);
//! assert!(r.has_errors());
//! assert!(!r.has_failed());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// A successfully processed value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Success<T>(T);

impl<T> Success<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &T {
        &self.0
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.0
    }

    pub fn into_value(self) -> T {
        self.0
    }
}

/// A record-level error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure<E>(E);

impl<E> Failure<E> {
    pub fn new(error: E) -> Self {
        Self(error)
    }

    pub fn error(&self) -> &E {
        &self.0
    }

    pub fn into_error(self) -> E {
        self.0
    }
}

/// Why a single record was rejected, and by which stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    /// Identifier of the offending record, when one could be read.
    pub record_id: Option<String>,
    /// Name of the stage that rejected the record.
    pub stage: String,
    /// Human-readable reason.
    pub message: String,
}

impl RecordFailure {
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            record_id: None,
            stage: stage.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_record(mut self, id: impl Into<String>) -> Self {
        self.record_id = Some(id.into());
        self
    }
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.record_id {
            Some(id) => write!(f, "[{}] {}: {}", self.stage, id, self.message),
            None => write!(f, "[{}] {}", self.stage, self.message),
        }
    }
}

impl std::error::Error for RecordFailure {}

/// Outcome of one stage over one batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageResult<T, E> {
    pub stage_name: String,
    pub details: String,
    has_failed: bool,
    successes: Vec<Success<T>>,
    failures: Vec<Failure<E>>,
}

/// Counts-only view of a [`StageResult`], suitable for logs and reports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage_name: String,
    pub has_failed: bool,
    pub total_processed: usize,
    pub total_success: usize,
    pub total_failed: usize,
    pub details: String,
}

impl<T, E> StageResult<T, E> {
    pub fn new(stage_name: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            details: details.into(),
            has_failed: false,
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// A result for a stage that could not run at all.
    pub fn failed(stage_name: impl Into<String>, details: impl Into<String>) -> Self {
        let mut r = Self::new(stage_name, details);
        r.has_failed = true;
        r
    }

    pub fn add_ok(&mut self, value: T) {
        self.successes.push(Success::new(value));
    }

    pub fn add_err(&mut self, error: E) {
        self.failures.push(Failure::new(error));
    }

    pub fn push_success(&mut self, success: Success<T>) {
        self.successes.push(success);
    }

    pub fn push_failure(&mut self, failure: Failure<E>) {
        self.failures.push(failure);
    }

    pub fn successes(&self) -> &[Success<T>] {
        &self.successes
    }

    pub fn failures(&self) -> &[Failure<E>] {
        &self.failures
    }

    pub fn success_values(&self) -> impl Iterator<Item = &T> {
        self.successes.iter().map(Success::value)
    }

    pub fn failure_values(&self) -> impl Iterator<Item = &E> {
        self.failures.iter().map(Failure::error)
    }

    /// Take the success values out, leaving the failures behind.
    pub fn take_success_values(&mut self) -> Vec<T> {
        std::mem::take(&mut self.successes)
            .into_iter()
            .map(Success::into_value)
            .collect()
    }

    /// Move every failure of `previous` into this result.
    ///
    /// Stages only treat successes as work items; a stage that wants the
    /// failure history to keep flowing downstream calls this explicitly.
    pub fn forward_failures_from<U>(&mut self, previous: &mut StageResult<U, E>) {
        self.failures.append(&mut previous.failures);
    }

    pub fn into_parts(self) -> (Vec<Success<T>>, Vec<Failure<E>>) {
        (self.successes, self.failures)
    }

    pub fn has_success(&self) -> bool {
        !self.successes.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn has_failed(&self) -> bool {
        self.has_failed
    }

    pub fn mark_failed(&mut self, value: bool) {
        self.has_failed = value;
    }

    pub fn len(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Share of failed items, `0.0` for an empty result.
    pub fn failure_ratio(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.failures.len() as f64 / self.len() as f64
        }
    }

    pub fn summary(&self) -> StageSummary {
        StageSummary {
            stage_name: self.stage_name.clone(),
            has_failed: self.has_failed,
            total_processed: self.len(),
            total_success: self.successes.len(),
            total_failed: self.failures.len(),
            details: self.details.clone(),
        }
    }
}

impl<T, E> fmt::Display for StageResult<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StageResult(stage_name={}, total_processed={}, total_success={}, total_failed={})",
            self.stage_name,
            self.len(),
            self.successes.len(),
            self.failures.len()
        )
    }
}

/// When to escalate record-level failures into a catastrophic stage failure.
///
/// Without a policy a stage result is never escalated. With one, a result
/// whose failure ratio exceeds `max_failure_ratio` (and that holds at least
/// `min_records` items) is marked failed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailurePolicy {
    pub max_failure_ratio: f64,
    #[serde(default = "default_min_records")]
    pub min_records: usize,
}

fn default_min_records() -> usize {
    1
}

impl FailurePolicy {
    pub fn max_ratio(max_failure_ratio: f64) -> Self {
        Self {
            max_failure_ratio,
            min_records: default_min_records(),
        }
    }

    /// Mark `result` failed if it breaches the policy. Returns whether it did.
    pub fn apply<T, E>(&self, result: &mut StageResult<T, E>) -> bool {
        let breached =
            result.len() >= self.min_records && result.failure_ratio() > self.max_failure_ratio;
        if breached {
            result.mark_failed(true);
        }
        breached
    }
}
