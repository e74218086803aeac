use super::{encode_ndjson, SinkError};
use crate::ingest::{Batch, BatchConsumer, ConsumerError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Appends each record's payload to a file as NDJSON
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: File,
}

impl FileSink {
    pub async fn open(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BatchConsumer for FileSink {
    async fn consume(&mut self, batch: Batch) -> Result<(), ConsumerError> {
        let bytes = encode_ndjson(&batch).map_err(|e| ConsumerError::rejected(e.to_string()))?;

        self.file.write_all(&bytes).await.map_err(|e| {
            ConsumerError::rejected(format!("failed to write {}: {}", self.path.display(), e))
        })?;
        self.file.flush().await.map_err(|e| {
            ConsumerError::rejected(format!("failed to flush {}: {}", self.path.display(), e))
        })?;

        tracing::debug!(path = %self.path.display(), records = batch.len(), "Appended batch to file");
        Ok(())
    }
}
