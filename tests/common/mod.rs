#![allow(dead_code)]

use async_trait::async_trait;
use logtap::ingest::{Batch, BatchConsumer, ConsumerError};
use logtap::source::{FetchError, LogFetcher, LogPage, LogRecord};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Fetcher that plays back a fixed sequence of responses, then reports
/// exhaustion. Records every cursor it was called with.
pub struct ScriptedFetcher {
    responses: Mutex<VecDeque<Result<LogPage, FetchError>>>,
    cursors: Mutex<Vec<Option<String>>>,
}

impl ScriptedFetcher {
    pub fn new(responses: Vec<Result<LogPage, FetchError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            cursors: Mutex::new(Vec::new()),
        }
    }

    pub fn cursors(&self) -> Vec<Option<String>> {
        self.cursors.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.cursors.lock().unwrap().len()
    }
}

#[async_trait]
impl LogFetcher for ScriptedFetcher {
    async fn fetch_page(&self, cursor: Option<&str>, _page_size: usize) -> Result<LogPage, FetchError> {
        self.cursors.lock().unwrap().push(cursor.map(str::to_string));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(LogPage::exhausted()))
    }
}

/// Fetcher over an endless, strictly increasing stream of records, taking
/// `latency` per page
#[derive(Default)]
pub struct EndlessFetcher {
    pub latency: Duration,
}

impl EndlessFetcher {
    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl LogFetcher for EndlessFetcher {
    async fn fetch_page(&self, cursor: Option<&str>, page_size: usize) -> Result<LogPage, FetchError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let start = cursor.map(|c| c.parse::<u32>().unwrap() + 1).unwrap_or(0);
        Ok(page(start, page_size as u32))
    }
}

/// Records `[start, start + count)` with zero-padded positions
pub fn records(start: u32, count: u32) -> Vec<LogRecord> {
    (start..start + count)
        .map(|i| LogRecord::new(position(i), json!({ "log_id": position(i), "seq": i })))
        .collect()
}

pub fn position(i: u32) -> String {
    format!("{:08}", i)
}

pub fn page(start: u32, count: u32) -> LogPage {
    LogPage::new(records(start, count))
}

/// Consumer that records every batch and can be told to fail or stall
#[derive(Default)]
pub struct RecordingConsumer {
    pub batches: Vec<Batch>,
    /// 1-based invocation numbers that reject their batch
    pub fail_on: Vec<usize>,
    /// Simulated processing time per batch
    pub delay: Option<Duration>,
    calls: usize,
}

impl RecordingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(calls: &[usize]) -> Self {
        Self {
            fail_on: calls.to_vec(),
            ..Self::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.iter().map(|b| b.len()).collect()
    }

    pub fn delivered_positions(&self) -> Vec<String> {
        self.batches
            .iter()
            .flat_map(|b| b.records().iter().map(|r| r.position.clone()))
            .collect()
    }
}

#[async_trait]
impl BatchConsumer for RecordingConsumer {
    async fn consume(&mut self, batch: Batch) -> Result<(), ConsumerError> {
        self.calls += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failed = self.fail_on.contains(&self.calls);
        self.batches.push(batch);
        if failed {
            return Err(ConsumerError::rejected(format!("call {} refused", self.calls)));
        }
        Ok(())
    }
}
