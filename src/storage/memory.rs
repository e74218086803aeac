use super::traits::{CheckpointStore, StorageError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local checkpoint store.
///
/// Counts saves so callers can verify when a run persisted its cursor.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    positions: Mutex<HashMap<String, String>>,
    saves: Mutex<usize>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a checkpoint for `key`
    pub fn with_checkpoint(key: &str, position: &str) -> Self {
        let store = Self::default();
        if let Ok(mut positions) = store.positions.lock() {
            positions.insert(key.to_string(), position.to_string());
        }
        store
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.positions.lock().ok()?.get(key).cloned()
    }

    /// Number of successful `save` calls
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let positions = self
            .positions
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        Ok(positions.get(key).cloned())
    }

    async fn save(&self, key: &str, position: &str) -> Result<(), StorageError> {
        self.positions
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?
            .insert(key.to_string(), position.to_string());
        *self.saves.lock().map_err(|e| StorageError::Lock(e.to_string()))? += 1;
        Ok(())
    }
}
