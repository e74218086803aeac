use async_trait::async_trait;

/// Key-value persistence for checkpoint cursors.
///
/// A run reads its key once at start and writes it at most once at the end.
/// Callers serialize runs that share a key.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn save(&self, key: &str, position: &str) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("lock error: {0}")]
    Lock(String),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("storage error: {0}")]
    Generic(String),
}
