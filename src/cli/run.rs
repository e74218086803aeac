use crate::config::parse::{load_config, ConfigError};
use crate::config::types::Config;
use crate::ingest::{IngestConfig, IngestError, IngestRunner, RunOutcome};
use crate::sink::{build_sink, SinkError};
use crate::source::{FetchError, HttpLogSource};
use crate::storage::{DuckDbCheckpointStore, StorageError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RunCommandError {
    #[error("config not found (searched ~/.config/logtap/config.yml and /etc/logtap/config.yml); use --config <path> or run 'logtap config init'")]
    ConfigNotFound,

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("checkpoint storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("log source error: {0}")]
    Source(#[from] FetchError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("failed to encode run outcome: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load config, perform one ingestion run, and optionally print the outcome
pub async fn run(config_path: Option<PathBuf>, print_json: bool) -> Result<RunOutcome, RunCommandError> {
    let config_path = config_path.ok_or(RunCommandError::ConfigNotFound)?;
    let config = load(&config_path)?;

    let outcome = run_once(&config).await?;

    if print_json {
        let json = serde_json::to_string_pretty(&outcome)?;
        // Keep stdout clean for NDJSON when the sink writes there
        if config.sink.writes_stdout() {
            eprintln!("{}", json);
        } else {
            println!("{}", json);
        }
    }

    Ok(outcome)
}

fn load(config_path: &Path) -> Result<Config, RunCommandError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    Ok(load_config(config_path)?)
}

/// Wire the configured collaborators together and run the loop once
pub async fn run_once(config: &Config) -> Result<RunOutcome, RunCommandError> {
    info!(path = %config.checkpoint.path.display(), key = %config.checkpoint.key, "Opening checkpoint store");
    let store = Arc::new(DuckDbCheckpointStore::open(&config.checkpoint.path)?);

    info!(domain = %config.source.domain, "Creating log source client");
    let fetcher = Arc::new(HttpLogSource::new(&config.source)?);

    let runner = IngestRunner::new(IngestConfig::from(config), fetcher, store)?;
    let mut sink = build_sink(&config.sink).await?;

    Ok(runner.run(sink.as_mut()).await?)
}
