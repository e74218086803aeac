use super::accumulator::Batch;
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use thiserror::Error;

/// Why a consumer did not accept a batch
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ConsumerError {
    /// The consumer completed and reported failure
    #[error("batch rejected: {0}")]
    Rejected(String),

    /// The consumer panicked while processing the batch
    #[error("consumer panicked: {0}")]
    Panicked(String),
}

impl ConsumerError {
    pub fn rejected(message: impl Into<String>) -> Self {
        ConsumerError::Rejected(message.into())
    }
}

/// Receives each flushed batch. The run waits for `consume` to finish before
/// fetching again.
#[async_trait]
pub trait BatchConsumer: Send {
    async fn consume(&mut self, batch: Batch) -> Result<(), ConsumerError>;
}

/// Adapts an async closure into a [`BatchConsumer`]
pub struct FnConsumer<F> {
    f: F,
}

pub fn from_fn<F, Fut>(f: F) -> FnConsumer<F>
where
    F: FnMut(Batch) -> Fut + Send,
    Fut: Future<Output = Result<(), ConsumerError>> + Send,
{
    FnConsumer { f }
}

#[async_trait]
impl<F, Fut> BatchConsumer for FnConsumer<F>
where
    F: FnMut(Batch) -> Fut + Send,
    Fut: Future<Output = Result<(), ConsumerError>> + Send,
{
    async fn consume(&mut self, batch: Batch) -> Result<(), ConsumerError> {
        (self.f)(batch).await
    }
}

/// Hand a batch to the consumer, turning a panic into [`ConsumerError::Panicked`]
pub(crate) async fn deliver<C>(consumer: &mut C, batch: Batch) -> Result<(), ConsumerError>
where
    C: BatchConsumer + ?Sized,
{
    match AssertUnwindSafe(consumer.consume(batch)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(ConsumerError::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
