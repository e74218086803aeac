use super::encode_ndjson;
use crate::ingest::{Batch, BatchConsumer, ConsumerError};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

/// Writes each record's payload to stdout as NDJSON
#[derive(Debug, Default)]
pub struct StdoutSink {
    stdout: Option<tokio::io::Stdout>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BatchConsumer for StdoutSink {
    async fn consume(&mut self, batch: Batch) -> Result<(), ConsumerError> {
        let bytes = encode_ndjson(&batch).map_err(|e| ConsumerError::rejected(e.to_string()))?;
        let stdout = self.stdout.get_or_insert_with(tokio::io::stdout);

        stdout
            .write_all(&bytes)
            .await
            .map_err(|e| ConsumerError::rejected(format!("failed to write to stdout: {}", e)))?;
        stdout
            .flush()
            .await
            .map_err(|e| ConsumerError::rejected(format!("failed to flush stdout: {}", e)))?;
        Ok(())
    }
}
