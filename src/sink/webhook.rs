use super::SinkError;
use crate::ingest::{Batch, BatchConsumer, ConsumerError};
use async_trait::async_trait;
use std::time::Duration;

/// POSTs each batch as a JSON array of payloads. Any non-2xx response
/// rejects the batch.
#[derive(Debug)]
pub struct WebhookSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait]
impl BatchConsumer for WebhookSink {
    async fn consume(&mut self, batch: Batch) -> Result<(), ConsumerError> {
        let payloads: Vec<&serde_json::Value> = batch.records().iter().map(|r| &r.payload).collect();

        let response = self
            .client
            .post(&self.url)
            .json(&payloads)
            .send()
            .await
            .map_err(|e| ConsumerError::rejected(format!("webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ConsumerError::rejected(format!(
                "webhook returned status {}: {}",
                status, body
            )));
        }

        tracing::debug!(url = %self.url, records = batch.len(), "Delivered batch to webhook");
        Ok(())
    }
}
