use super::traits::{CheckpointStore, StorageError};
use async_trait::async_trait;
use chrono::Utc;
use duckdb::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Check if a process with the given PID is still running
fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use std::process::Command;
        Command::new("ps")
            .arg("-p")
            .arg(pid.to_string())
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

/// Extract the holder PID from a DuckDB lock error ("... (PID 12345) ...")
fn extract_pid_from_lock_error(error_msg: &str) -> Option<u32> {
    let start = error_msg.find("(PID ")? + 5;
    let end = error_msg[start..].find(')')?;
    error_msg[start..start + end].parse().ok()
}

fn remove_lock_files(db_path: &Path) -> std::io::Result<()> {
    for suffix in ["wal", "lock"] {
        let stale = PathBuf::from(format!("{}.{}", db_path.display(), suffix));
        if stale.exists() {
            std::fs::remove_file(&stale)?;
            tracing::info!(path = %stale.display(), "Removed stale database file");
        }
    }
    Ok(())
}

/// Checkpoint store persisted in a DuckDB database, one row per key
pub struct DuckDbCheckpointStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbCheckpointStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    ///
    /// A lock left behind by a crashed run is cleared when its holder is gone.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Generic(format!(
                        "failed to create checkpoint directory '{}': {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = match Connection::open(path) {
            Ok(conn) => conn,
            Err(e) => {
                let error_msg = e.to_string();
                let stale_pid = if error_msg.contains("Could not set lock") {
                    extract_pid_from_lock_error(&error_msg).filter(|pid| !is_process_running(*pid))
                } else {
                    None
                };

                match stale_pid {
                    Some(pid) => {
                        tracing::warn!(pid = pid, "Checkpoint database locked by a dead process, removing stale lock");
                        if let Err(io_err) = remove_lock_files(path) {
                            tracing::error!(error = %io_err, "Failed to remove lock files");
                            return Err(e.into());
                        }
                        Connection::open(path)?
                    }
                    None => return Err(e.into()),
                }
            }
        };

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory database (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let store = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                key VARCHAR PRIMARY KEY,
                position VARCHAR NOT NULL,
                updated_at BIGINT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StorageError> {
    conn.lock()
        .map_err(|e| StorageError::Lock(format!("checkpoint connection poisoned: {}", e)))
}

#[async_trait]
impl CheckpointStore for DuckDbCheckpointStore {
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            let mut stmt = conn.prepare("SELECT position FROM checkpoints WHERE key = ?")?;
            let mut rows = stmt.query(duckdb::params![key])?;

            let position = match rows.next()? {
                Some(row) => Some(row.get::<_, String>(0)?),
                None => None,
            };
            Ok::<_, StorageError>(position)
        })
        .await?
    }

    async fn save(&self, key: &str, position: &str) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        let key = key.to_string();
        let position = position.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            conn.execute(
                "INSERT OR REPLACE INTO checkpoints (key, position, updated_at) VALUES (?, ?, ?)",
                duckdb::params![key, position, Utc::now().timestamp_micros()],
            )?;
            tracing::debug!(key = %key, position = %position, "Checkpoint saved");
            Ok::<(), StorageError>(())
        })
        .await?
    }
}
