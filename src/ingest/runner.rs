use super::accumulator::BatchAccumulator;
use super::budget::RunBudget;
use super::consumer::{deliver, BatchConsumer};
use super::cursor::CheckpointCursor;
use super::status::{RunError, RunOutcome, StatusTracker, StopReason};
use crate::config::types::{Config, DEFAULT_BATCH_SIZE, DEFAULT_PAGE_SIZE};
use crate::source::fetcher::LogFetcher;
use crate::storage::traits::{CheckpointStore, StorageError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid ingest configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to load checkpoint: {0}")]
    CheckpointLoad(#[source] StorageError),
}

/// Settings for the loop itself, resolved once at construction
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub max_run_time: Duration,
    pub batch_size: usize,
    pub page_size: usize,
    pub checkpoint_key: String,
}

impl IngestConfig {
    pub fn new(max_run_time: Duration) -> Self {
        Self {
            max_run_time,
            batch_size: DEFAULT_BATCH_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            checkpoint_key: "default".to_string(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_checkpoint_key(mut self, key: impl Into<String>) -> Self {
        self.checkpoint_key = key.into();
        self
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_run_time.is_zero() {
            return Err(IngestError::InvalidConfig(
                "max_run_time must be greater than zero".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(IngestError::InvalidConfig(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(IngestError::InvalidConfig(
                "page_size must be greater than zero".to_string(),
            ));
        }
        if self.checkpoint_key.trim().is_empty() {
            return Err(IngestError::InvalidConfig(
                "checkpoint key cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&Config> for IngestConfig {
    fn from(config: &Config) -> Self {
        IngestConfig::new(config.ingest.max_run_time)
            .with_batch_size(config.ingest.batch_size)
            .with_page_size(config.source.page_size)
            .with_checkpoint_key(config.checkpoint.key.clone())
    }
}

/// What happens once the pending batch has been delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Then {
    Fetch,
    Succeed(StopReason),
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Fetching,
    Delivering { then: Then },
    StoppedSuccess(StopReason),
    StoppedError,
}

impl From<Then> for LoopState {
    fn from(then: Then) -> Self {
        match then {
            Then::Fetch => LoopState::Fetching,
            Then::Succeed(reason) => LoopState::StoppedSuccess(reason),
            Then::Fail => LoopState::StoppedError,
        }
    }
}

/// Per-run mutable state, owned by the driver for the duration of a run
struct RunState {
    budget: RunBudget,
    cursor: CheckpointCursor,
    accumulator: BatchAccumulator,
    tracker: StatusTracker,
}

/// Drives one ingestion run: fetch pages from the checkpoint, batch them,
/// deliver to the consumer, stop on exhaustion, budget or errors.
pub struct IngestRunner {
    config: IngestConfig,
    fetcher: Arc<dyn LogFetcher>,
    store: Arc<dyn CheckpointStore>,
}

impl IngestRunner {
    pub fn new(
        config: IngestConfig,
        fetcher: Arc<dyn LogFetcher>,
        store: Arc<dyn CheckpointStore>,
    ) -> Result<Self, IngestError> {
        config.validate()?;
        Ok(Self {
            config,
            fetcher,
            store,
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Run once. Only a checkpoint that cannot be read fails the call; every
    /// other problem is reported in the outcome's status.
    pub async fn run<C>(&self, consumer: &mut C) -> Result<RunOutcome, IngestError>
    where
        C: BatchConsumer + ?Sized,
    {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("ingest_run", run_id = %run_id);
        self.run_inner(run_id, consumer).instrument(span).await
    }

    async fn run_inner<C>(&self, run_id: Uuid, consumer: &mut C) -> Result<RunOutcome, IngestError>
    where
        C: BatchConsumer + ?Sized,
    {
        let key = &self.config.checkpoint_key;
        let initial = self
            .store
            .load(key)
            .await
            .map_err(IngestError::CheckpointLoad)?;

        info!(
            checkpoint = ?initial,
            max_run_time_ms = self.config.max_run_time.as_millis() as u64,
            batch_size = self.config.batch_size,
            page_size = self.config.page_size,
            "Starting ingest run"
        );

        let mut run = RunState {
            budget: RunBudget::start(self.config.max_run_time),
            cursor: CheckpointCursor::new(initial),
            accumulator: BatchAccumulator::new(self.config.batch_size),
            tracker: StatusTracker::new(),
        };

        let mut state = LoopState::Fetching;
        let stop_reason = loop {
            state = match state {
                LoopState::Fetching => self.fetch_cycle(&mut run).await,
                LoopState::Delivering { then } => self.deliver_batch(consumer, &mut run, then).await,
                LoopState::StoppedSuccess(reason) => break reason,
                LoopState::StoppedError => break StopReason::Errors,
            };
        };

        let RunState {
            budget,
            cursor,
            mut tracker,
            ..
        } = run;

        let checkpoint = cursor.last_fetched().map(str::to_string);

        // Nothing is persisted unless the consumer accepted at least one batch
        if tracker.logs_processed() > 0 {
            if let Some(position) = &checkpoint {
                match self.store.save(key, position).await {
                    Ok(()) => info!(checkpoint = %position, "Checkpoint persisted"),
                    Err(e) => {
                        error!(error = %e, checkpoint = %position, "Failed to persist checkpoint");
                        tracker.record_final_error(RunError::checkpoint(&e));
                    }
                }
            }
        }

        let status = tracker.finish();
        let elapsed = budget.elapsed();

        if status.is_success() {
            info!(
                logs_processed = status.logs_processed,
                checkpoint = ?checkpoint,
                stop_reason = %stop_reason,
                elapsed_ms = elapsed.as_millis() as u64,
                "Ingest run finished"
            );
        } else {
            error!(
                logs_processed = status.logs_processed,
                checkpoint = ?checkpoint,
                stop_reason = %stop_reason,
                errors = status.error.as_ref().map(|e| e.len()).unwrap_or(0),
                elapsed_ms = elapsed.as_millis() as u64,
                "Ingest run finished with errors"
            );
        }

        Ok(RunOutcome {
            run_id,
            status,
            checkpoint,
            stop_reason,
            elapsed,
        })
    }

    async fn fetch_cycle(&self, run: &mut RunState) -> LoopState {
        if run.budget.is_exhausted() {
            info!(
                elapsed_ms = run.budget.elapsed().as_millis() as u64,
                buffered = run.accumulator.len(),
                "Run time budget reached, stopping"
            );
            return LoopState::Delivering {
                then: Then::Succeed(StopReason::TimeBudget),
            };
        }

        let result = self
            .fetcher
            .fetch_page(run.cursor.fetch_from(), self.config.page_size)
            .await;

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    error = %e,
                    cursor = ?run.cursor.fetch_from(),
                    buffered = run.accumulator.len(),
                    "Failed to fetch log page"
                );
                if run.tracker.record_error(RunError::fetch(&e)) {
                    return LoopState::StoppedError;
                }
                // Deliver what we already have before stopping
                return LoopState::Delivering { then: Then::Fail };
            }
        };

        if page.outdated {
            warn!(
                records = page.records.len(),
                cursor = ?run.cursor.fetch_from(),
                "Log source reported an outdated page"
            );
            run.tracker.warn_outdated();
        }

        if page.is_exhausted() {
            debug!(buffered = run.accumulator.len(), "Log source exhausted");
            return LoopState::Delivering {
                then: Then::Succeed(StopReason::Exhausted),
            };
        }

        let count = page.records.len();
        if let Some(position) = page.last_position() {
            run.cursor.record_fetched(position);
        }
        run.accumulator.append(page.records);

        debug!(
            records = count,
            buffered = run.accumulator.len(),
            last_position = ?run.cursor.last_fetched(),
            "Fetched log page"
        );

        if run.accumulator.is_full() {
            LoopState::Delivering { then: Then::Fetch }
        } else {
            LoopState::Fetching
        }
    }

    async fn deliver_batch<C>(&self, consumer: &mut C, run: &mut RunState, then: Then) -> LoopState
    where
        C: BatchConsumer + ?Sized,
    {
        if run.accumulator.is_empty() {
            return then.into();
        }

        let batch = run.accumulator.flush();
        let count = batch.len();
        let last_position = batch.last_position().map(str::to_string);

        match deliver(consumer, batch).await {
            Ok(()) => {
                run.tracker.add_processed(count);
                if let Some(position) = last_position {
                    run.cursor.commit(position);
                }
                debug!(
                    records = count,
                    logs_processed = run.tracker.logs_processed(),
                    committed = ?run.cursor.last_committed(),
                    "Batch delivered"
                );
                then.into()
            }
            Err(e) => {
                warn!(
                    error = %e,
                    records = count,
                    errors = run.tracker.error_count() + 1,
                    "Consumer failed to process batch"
                );
                if run.tracker.record_error(RunError::consumer(&e)) {
                    LoopState::StoppedError
                } else {
                    then.into()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::accumulator::Batch;
    use crate::ingest::consumer::{from_fn, ConsumerError};
    use crate::source::fetcher::FetchError;
    use crate::source::record::{LogPage, LogRecord};
    use crate::storage::memory::MemoryCheckpointStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Serves scripted responses and remembers the cursors it was asked for
    struct ScriptedFetcher {
        responses: Mutex<VecDeque<Result<LogPage, FetchError>>>,
        cursors: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<Result<LogPage, FetchError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                cursors: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LogFetcher for ScriptedFetcher {
        async fn fetch_page(
            &self,
            cursor: Option<&str>,
            _page_size: usize,
        ) -> Result<LogPage, FetchError> {
            self.cursors.lock().unwrap().push(cursor.map(str::to_string));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(LogPage::exhausted()))
        }
    }

    fn page(start: u32, count: u32) -> LogPage {
        LogPage::new(
            (start..start + count)
                .map(|i| LogRecord::new(format!("{:06}", i), json!({ "seq": i })))
                .collect(),
        )
    }

    fn runner(fetcher: Arc<ScriptedFetcher>, store: Arc<MemoryCheckpointStore>) -> IngestRunner {
        let config = IngestConfig::new(Duration::from_secs(20))
            .with_batch_size(10)
            .with_page_size(10);
        IngestRunner::new(config, fetcher, store).unwrap()
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        assert!(IngestConfig::new(Duration::ZERO).validate().is_err());
        assert!(IngestConfig::new(Duration::from_secs(1))
            .with_batch_size(0)
            .validate()
            .is_err());
        assert!(IngestConfig::new(Duration::from_secs(1))
            .with_page_size(0)
            .validate()
            .is_err());
        assert!(IngestConfig::new(Duration::from_secs(1))
            .with_checkpoint_key(" ")
            .validate()
            .is_err());
        assert!(IngestConfig::new(Duration::from_secs(1)).validate().is_ok());
    }

    #[tokio::test]
    async fn test_resumes_from_stored_checkpoint() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![Ok(page(51, 10))]));
        let store = Arc::new(MemoryCheckpointStore::with_checkpoint("default", "000050"));
        let runner = runner(fetcher.clone(), store.clone());

        let mut consumer = from_fn(|_b: Batch| async { Ok(()) });
        let outcome = runner.run(&mut consumer).await.unwrap();

        let cursors = fetcher.cursors.lock().unwrap().clone();
        assert_eq!(cursors[0].as_deref(), Some("000050"));
        assert_eq!(cursors[1].as_deref(), Some("000060"));
        assert_eq!(outcome.checkpoint.as_deref(), Some("000060"));
        assert_eq!(store.get("default").as_deref(), Some("000060"));
    }

    #[tokio::test]
    async fn test_partial_batch_flushed_on_exhaustion() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![Ok(page(0, 4))]));
        let store = Arc::new(MemoryCheckpointStore::new());
        let runner = runner(fetcher, store);

        let mut sizes = Vec::new();
        let outcome = {
            let mut consumer = from_fn(|b: Batch| {
                sizes.push(b.len());
                async { Ok(()) }
            });
            runner.run(&mut consumer).await.unwrap()
        };

        assert_eq!(sizes, vec![4]);
        assert_eq!(outcome.stop_reason, StopReason::Exhausted);
        assert_eq!(outcome.status.logs_processed, 4);
    }

    #[tokio::test]
    async fn test_first_consumer_error_does_not_stop_run() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![Ok(page(0, 10)), Ok(page(10, 10))]));
        let store = Arc::new(MemoryCheckpointStore::new());
        let runner = runner(fetcher, store.clone());

        let mut calls = 0;
        let mut consumer = from_fn(move |_b: Batch| {
            calls += 1;
            let result = if calls == 1 {
                Err(ConsumerError::rejected("first batch refused"))
            } else {
                Ok(())
            };
            async move { result }
        });
        let outcome = runner.run(&mut consumer).await.unwrap();

        assert_eq!(outcome.status.logs_processed, 10);
        assert_eq!(outcome.stop_reason, StopReason::Exhausted);
        assert_eq!(outcome.status.error.as_ref().unwrap().len(), 1);
        assert_eq!(outcome.checkpoint.as_deref(), Some("000019"));
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_second_consumer_error_halts() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            Ok(page(0, 10)),
            Ok(page(10, 10)),
            Ok(page(20, 10)),
        ]));
        let store = Arc::new(MemoryCheckpointStore::new());
        let runner = runner(fetcher.clone(), store.clone());

        let mut consumer = from_fn(|_b: Batch| async { Err(ConsumerError::rejected("nope")) });
        let outcome = runner.run(&mut consumer).await.unwrap();

        assert_eq!(outcome.stop_reason, StopReason::Errors);
        assert_eq!(outcome.status.error.as_ref().unwrap().len(), 2);
        assert_eq!(fetcher.cursors.lock().unwrap().len(), 2);
        assert_eq!(outcome.checkpoint.as_deref(), Some("000019"));
        assert_eq!(store.save_count(), 0);
    }
}
