use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub ingest: IngestSettings,
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub sink: SinkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub domain: String,
    pub client_id: String,
    pub client_secret: String,
    /// Minimum level requested from the source; forwarded as-is
    #[serde(default)]
    pub log_level: Option<LogLevel>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_retry_interval", with = "humantime_serde")]
    pub retry_interval: Duration,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Pages whose newest record is older than this are flagged outdated
    #[serde(default, with = "humantime_serde")]
    pub stale_after: Option<Duration>,
    /// Overrides `https://{domain}`, e.g. for a proxy
    #[serde(default)]
    pub api_base_url: Option<String>,
}

impl SourceConfig {
    pub fn base_url(&self) -> String {
        match &self.api_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}", self.domain),
        }
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_max_retries() -> usize {
    3
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    #[serde(with = "humantime_serde")]
    pub max_run_time: Duration,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// DuckDB database holding checkpoints
    pub path: PathBuf,
    #[serde(default = "default_checkpoint_key")]
    pub key: String,
}

fn default_checkpoint_key() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    #[default]
    Stdout,
    File {
        path: PathBuf,
    },
    Webhook {
        url: String,
        #[serde(default = "default_timeout", with = "humantime_serde")]
        timeout: Duration,
    },
}

impl SinkConfig {
    pub fn writes_stdout(&self) -> bool {
        matches!(self, SinkConfig::Stdout)
    }
}
