pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# LOGTAP CONFIGURATION
# =============================================================================
# Each invocation performs one ingestion run: it resumes from the stored
# checkpoint, pulls log pages from the source, hands batches to the sink, and
# stops when the source is exhausted, the time budget runs out, or errors occur.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/logtap/config.yml
#   3. /etc/logtap/config.yml
#
# Values may reference environment variables with $env{VAR_NAME}.

# =============================================================================
# SOURCE
# =============================================================================

source:
  # Tenant domain of the management API (host name only)
  domain: tenant.example.com
  client_id: $env{LOGTAP_CLIENT_ID}
  client_secret: $env{LOGTAP_CLIENT_SECRET}
  # Optional level filter forwarded to the source:
  # debug, info, warning, error, critical
  # log_level: warning
  # Records requested per page
  page_size: 100
  timeout: 30s
  # Transient failures (timeouts, 429, 5xx) are retried with backoff
  retry_interval: 1s
  max_retries: 3
  # Flag pages whose newest entry is older than this as outdated (warning only)
  # stale_after: 15m

# =============================================================================
# INGEST
# =============================================================================

ingest:
  # Wall-clock budget per run; no new page is fetched once it is spent
  max_run_time: 20s
  # Records handed to the sink per batch (may span several pages)
  batch_size: 100

# =============================================================================
# CHECKPOINT
# =============================================================================

checkpoint:
  # DuckDB database holding the last read position
  path: ~/.local/share/logtap/checkpoints.duckdb
  key: default

# =============================================================================
# SINK
# =============================================================================
# stdout:  one JSON document per line on stdout
# file:    append NDJSON to a file
#   type: file
#   path: /var/log/logtap/logs.ndjson
# webhook: POST each batch as a JSON array
#   type: webhook
#   url: https://collector.example.com/ingest
#   timeout: 30s

sink:
  type: stdout
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse::parse_config;

    #[test]
    fn test_starter_config_parses_once_credentials_are_set() {
        std::env::set_var("LOGTAP_CLIENT_ID", "starter-id");
        std::env::set_var("LOGTAP_CLIENT_SECRET", "starter-secret");

        let config = parse_config(&generate_starter_config()).unwrap();
        assert_eq!(config.source.client_id, "starter-id");
        assert_eq!(config.ingest.batch_size, 100);
        assert!(config.sink.writes_stdout());
    }
}
