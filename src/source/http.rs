use super::fetcher::{FetchError, LogFetcher};
use super::record::{LogPage, LogRecord};
use crate::config::types::{LogLevel, SourceConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;

pub type Result<T> = std::result::Result<T, FetchError>;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Log source backed by a management API that issues client-credentials
/// tokens and serves logs via `GET /api/v2/logs?from=<log_id>&take=<n>`.
#[derive(Debug)]
pub struct HttpLogSource {
    domain: String,
    base_url: String,
    client_id: String,
    client_secret: String,
    log_level: Option<LogLevel>,
    stale_after: Option<Duration>,
    client: reqwest::Client,
    retry_interval: Duration,
    max_retries: usize,
    token: RwLock<Option<String>>,
}

impl HttpLogSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            domain: config.domain.clone(),
            base_url: config.base_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            log_level: config.log_level,
            stale_after: config.stale_after,
            client,
            retry_interval: config.retry_interval,
            max_retries: config.max_retries,
            token: RwLock::new(None),
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.as_ref() {
            return Ok(token.clone());
        }
        self.request_token().await
    }

    /// Exchange client credentials for a bearer token and cache it
    async fn request_token(&self) -> Result<String> {
        let url = format!("{}/oauth/token", self.base_url);
        let request_body = TokenRequest {
            grant_type: "client_credentials",
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            audience: format!("https://{}/api/v2/", self.domain),
        };

        let response = self.client.post(&url).json(&request_body).send().await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }

        if status.is_server_error() {
            return Err(FetchError::Remote {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        if !status.is_success() {
            return Err(FetchError::Auth {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.bytes().await?;
        let token: TokenResponse = serde_json::from_slice(&body)?;

        tracing::debug!(domain = %self.domain, "Obtained access token");
        *self.token.write().await = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    async fn get_logs(&self, cursor: Option<&str>, take: usize) -> Result<Vec<serde_json::Value>> {
        let url = format!("{}/api/v2/logs", self.base_url);
        let mut refreshed = false;

        loop {
            let token = self.access_token().await?;

            let mut request = self
                .client
                .get(&url)
                .bearer_auth(&token)
                .query(&[("take", take.to_string())]);
            if let Some(from) = cursor {
                request = request.query(&[("from", from)]);
            }
            if let Some(level) = self.log_level {
                request = request.query(&[("level", level.as_str())]);
            }

            let response = request.send().await?;
            let status = response.status();

            if status == reqwest::StatusCode::UNAUTHORIZED && !refreshed {
                // Cached token expired; drop it and try once with a fresh one
                tracing::debug!(domain = %self.domain, "Access token rejected, refreshing");
                *self.token.write().await = None;
                refreshed = true;
                continue;
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(FetchError::RateLimited);
            }

            if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                return Err(FetchError::Auth {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
            }

            if !status.is_success() {
                return Err(FetchError::Remote {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
            }

            let body = response.bytes().await?;
            let entries: Vec<serde_json::Value> = serde_json::from_slice(&body)?;
            return Ok(entries);
        }
    }

    async fn fetch_once(&self, cursor: Option<&str>, page_size: usize) -> Result<LogPage> {
        let entries = self.get_logs(cursor, page_size).await?;

        let records = entries
            .into_iter()
            .map(into_record)
            .collect::<Result<Vec<_>>>()?;

        let outdated = match self.stale_after {
            Some(stale_after) => is_stale(&records, stale_after, Utc::now()),
            None => false,
        };

        Ok(LogPage { records, outdated })
    }

    /// Retry transient failures with exponential backoff
    async fn with_retry<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempts = 0;
        let mut backoff = self.retry_interval;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    attempts += 1;
                    if attempts > self.max_retries {
                        if self.max_retries == 0 {
                            return Err(e);
                        }
                        tracing::error!(
                            domain = %self.domain,
                            attempts = attempts,
                            error = %e,
                            "Max retries exceeded"
                        );
                        return Err(FetchError::MaxRetriesExceeded(e.to_string()));
                    }

                    tracing::warn!(
                        domain = %self.domain,
                        attempt = attempts,
                        backoff_ms = backoff.as_millis(),
                        error = %e,
                        "Log request failed, retrying"
                    );

                    tokio::time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, MAX_BACKOFF);
                }
            }
        }
    }
}

#[async_trait]
impl LogFetcher for HttpLogSource {
    async fn fetch_page(&self, cursor: Option<&str>, page_size: usize) -> Result<LogPage> {
        self.with_retry(|| self.fetch_once(cursor, page_size)).await
    }
}

fn into_record(entry: serde_json::Value) -> Result<LogRecord> {
    let position = entry
        .get("log_id")
        .or_else(|| entry.get("_id"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| FetchError::Other("log entry has no log_id".to_string()))?;

    Ok(LogRecord::new(position, entry))
}

fn record_date(record: &LogRecord) -> Option<DateTime<Utc>> {
    record
        .payload
        .get("date")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

/// A page is stale when even its newest dated record is older than `stale_after`
fn is_stale(records: &[LogRecord], stale_after: Duration, now: DateTime<Utc>) -> bool {
    let Some(newest) = records.iter().filter_map(record_date).max() else {
        return false;
    };

    match chrono::Duration::from_std(stale_after) {
        Ok(limit) => now - newest > limit,
        Err(_) => false,
    }
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    audience: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_config() -> SourceConfig {
        SourceConfig {
            domain: "tenant.example.com".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            log_level: None,
            page_size: 100,
            timeout: Duration::from_secs(30),
            retry_interval: Duration::from_millis(10),
            max_retries: 3,
            stale_after: None,
            api_base_url: None,
        }
    }

    #[test]
    fn test_source_uses_domain_as_base_url() {
        let source = HttpLogSource::new(&make_config()).unwrap();
        assert_eq!(source.base_url, "https://tenant.example.com");
        assert_eq!(source.domain(), "tenant.example.com");
    }

    #[test]
    fn test_base_url_override_strips_trailing_slash() {
        let mut config = make_config();
        config.api_base_url = Some("http://127.0.0.1:9000/".to_string());
        let source = HttpLogSource::new(&config).unwrap();
        assert_eq!(source.base_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn test_record_position_prefers_log_id() {
        let record = into_record(json!({"log_id": "90020", "_id": "x"})).unwrap();
        assert_eq!(record.position, "90020");

        let record = into_record(json!({"_id": "90021"})).unwrap();
        assert_eq!(record.position, "90021");

        assert!(into_record(json!({"type": "s"})).is_err());
    }

    #[test]
    fn test_staleness_uses_newest_record() {
        let now: DateTime<Utc> = "2026-03-01T12:00:00Z".parse().unwrap();
        let records = vec![
            LogRecord::new("1", json!({"date": "2026-03-01T10:00:00Z"})),
            LogRecord::new("2", json!({"date": "2026-03-01T11:55:00Z"})),
        ];

        assert!(!is_stale(&records, Duration::from_secs(600), now));
        assert!(is_stale(&records, Duration::from_secs(60), now));
    }

    #[test]
    fn test_undated_records_are_never_stale() {
        let now = Utc::now();
        let records = vec![LogRecord::new("1", json!({"type": "s"}))];
        assert!(!is_stale(&records, Duration::from_secs(1), now));
    }
}
