use super::consumer::ConsumerError;
use crate::source::fetcher::FetchError;
use crate::storage::traits::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Errors a run tolerates before halting. The first error is recorded and
/// the run carries on where it can; reaching this count stops it.
pub const MAX_RUN_ERRORS: usize = 2;

pub const OUTDATED_WARNING: &str =
    "log source flagged a page as outdated; recent entries may not be indexed yet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorKind {
    Fetch,
    Consumer,
    ConsumerPanic,
    Checkpoint,
}

/// One error observed during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub kind: RunErrorKind,
    pub message: String,
}

impl RunError {
    pub fn fetch(err: &FetchError) -> Self {
        Self {
            kind: RunErrorKind::Fetch,
            message: err.to_string(),
        }
    }

    pub fn consumer(err: &ConsumerError) -> Self {
        let kind = match err {
            ConsumerError::Rejected(_) => RunErrorKind::Consumer,
            ConsumerError::Panicked(_) => RunErrorKind::ConsumerPanic,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }

    pub fn checkpoint(err: &StorageError) -> Self {
        Self {
            kind: RunErrorKind::Checkpoint,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RunError {}

/// `status.error`: a single error, or the ordered list once more than one
/// was recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunErrors {
    Single(RunError),
    List(Vec<RunError>),
}

impl RunErrors {
    pub fn as_slice(&self) -> &[RunError] {
        match self {
            RunErrors::Single(error) => std::slice::from_ref(error),
            RunErrors::List(errors) => errors,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn kinds(&self) -> Vec<RunErrorKind> {
        self.as_slice().iter().map(|e| e.kind).collect()
    }
}

/// Fixed-capacity, ordered error record for one run
#[derive(Debug, Default)]
pub struct ErrorAccumulator {
    errors: Vec<RunError>,
}

impl ErrorAccumulator {
    pub fn new() -> Self {
        Self {
            errors: Vec::with_capacity(MAX_RUN_ERRORS),
        }
    }

    /// Record an error in arrival order. Returns true once the threshold is
    /// reached and the run must halt.
    pub fn record(&mut self, error: RunError) -> bool {
        if self.is_full() {
            tracing::warn!(error = %error, "Error limit already reached, discarding error");
            return true;
        }
        self.errors.push(error);
        self.is_full()
    }

    /// Record an error raised after the loop has stopped. Kept even past the
    /// threshold, since no halt decision is left to make.
    pub fn record_final(&mut self, error: RunError) {
        self.errors.push(error);
    }

    pub fn is_full(&self) -> bool {
        self.errors.len() >= MAX_RUN_ERRORS
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(mut self) -> Option<RunErrors> {
        match self.errors.len() {
            0 => None,
            1 => self.errors.pop().map(RunErrors::Single),
            _ => Some(RunErrors::List(self.errors)),
        }
    }
}

/// Accumulated outcome of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    /// Records the consumer accepted
    pub logs_processed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunErrors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Mutable status while the run is in progress
#[derive(Debug, Default)]
pub(crate) struct StatusTracker {
    logs_processed: usize,
    errors: ErrorAccumulator,
    warning: Option<String>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self {
            logs_processed: 0,
            errors: ErrorAccumulator::new(),
            warning: None,
        }
    }

    pub fn add_processed(&mut self, count: usize) {
        self.logs_processed += count;
    }

    pub fn logs_processed(&self) -> usize {
        self.logs_processed
    }

    pub fn record_error(&mut self, error: RunError) -> bool {
        self.errors.record(error)
    }

    pub fn record_final_error(&mut self, error: RunError) {
        self.errors.record_final(error)
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Later outdated pages leave the existing warning untouched
    pub fn warn_outdated(&mut self) {
        self.warning.get_or_insert_with(|| OUTDATED_WARNING.to_string());
    }

    pub fn finish(self) -> RunStatus {
        RunStatus {
            logs_processed: self.logs_processed,
            error: self.errors.into_errors(),
            warning: self.warning,
        }
    }
}

/// Why the run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The source returned an empty page
    Exhausted,
    /// The time budget ran out; not an error
    TimeBudget,
    /// An error ended the run
    Errors,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Exhausted => write!(f, "exhausted"),
            StopReason::TimeBudget => write!(f, "time budget"),
            StopReason::Errors => write!(f, "errors"),
        }
    }
}

/// Final result of a run. `checkpoint` is where the next run resumes; `None`
/// when nothing was fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub checkpoint: Option<String>,
    pub stop_reason: StopReason,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch_error(msg: &str) -> RunError {
        RunError::fetch(&FetchError::Other(msg.to_string()))
    }

    #[test]
    fn test_first_error_does_not_halt() {
        let mut errors = ErrorAccumulator::new();
        assert!(!errors.record(fetch_error("first")));
        assert!(!errors.is_full());
    }

    #[test]
    fn test_threshold_halts_at_max() {
        let mut errors = ErrorAccumulator::new();
        errors.record(RunError::consumer(&ConsumerError::rejected("bad batch")));
        assert!(errors.record(fetch_error("second")));
        assert_eq!(errors.len(), MAX_RUN_ERRORS);

        let errors = errors.into_errors().unwrap();
        assert_eq!(
            errors.kinds(),
            vec![RunErrorKind::Consumer, RunErrorKind::Fetch]
        );
    }

    #[test]
    fn test_overflow_is_discarded() {
        let mut errors = ErrorAccumulator::new();
        errors.record(fetch_error("a"));
        errors.record(fetch_error("b"));
        assert!(errors.record(fetch_error("c")));
        assert_eq!(errors.len(), MAX_RUN_ERRORS);
    }

    #[test]
    fn test_final_error_kept_past_threshold() {
        let mut errors = ErrorAccumulator::new();
        errors.record(fetch_error("a"));
        errors.record(fetch_error("b"));
        errors.record_final(RunError::checkpoint(&StorageError::Generic("disk full".to_string())));

        let errors = errors.into_errors().unwrap();
        assert_eq!(
            errors.kinds(),
            vec![RunErrorKind::Fetch, RunErrorKind::Fetch, RunErrorKind::Checkpoint]
        );
    }

    #[test]
    fn test_single_error_is_not_a_list() {
        let mut errors = ErrorAccumulator::new();
        errors.record(fetch_error("only"));
        assert!(matches!(errors.into_errors(), Some(RunErrors::Single(_))));
        assert!(ErrorAccumulator::new().into_errors().is_none());
    }

    #[test]
    fn test_error_serialization_shapes() {
        let single = RunErrors::Single(fetch_error("boom"));
        let value = serde_json::to_value(&single).unwrap();
        assert_eq!(value["kind"], "fetch");
        assert_eq!(value["message"], "boom");

        let list = RunErrors::List(vec![fetch_error("a"), fetch_error("b")]);
        let value = serde_json::to_value(&list).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_outdated_warning_is_idempotent() {
        let mut tracker = StatusTracker::new();
        tracker.warn_outdated();
        tracker.warn_outdated();
        let status = tracker.finish();
        assert_eq!(status.warning.as_deref(), Some(OUTDATED_WARNING));
        assert!(status.is_success());
    }

    #[test]
    fn test_panic_kind_differs_from_rejection() {
        let panicked = RunError::consumer(&ConsumerError::Panicked("oops".to_string()));
        assert_eq!(panicked.kind, RunErrorKind::ConsumerPanic);
    }
}
