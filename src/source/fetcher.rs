use super::record::LogPage;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication failed with status {status}: {message}")]
    Auth { status: u16, message: String },

    #[error("log source returned error status {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("rate limited by log source")]
    RateLimited,

    #[error("failed to decode log page: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("max retries exceeded: {0}")]
    MaxRetriesExceeded(String),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            FetchError::Remote { status, .. } => *status >= 500,
            FetchError::RateLimited => true,
            FetchError::Auth { .. }
            | FetchError::Decode(_)
            | FetchError::MaxRetriesExceeded(_)
            | FetchError::Other(_) => false,
        }
    }
}

/// Paginated access to a remote log source.
///
/// `cursor` is the position of the last record already read, or `None` to
/// read from the beginning. Implementations return at most `page_size`
/// records positioned strictly after `cursor`.
#[async_trait]
pub trait LogFetcher: Send + Sync {
    async fn fetch_page(&self, cursor: Option<&str>, page_size: usize)
        -> Result<LogPage, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::RateLimited.is_transient());
        assert!(FetchError::Remote {
            status: 503,
            message: "unavailable".to_string()
        }
        .is_transient());
        assert!(!FetchError::Remote {
            status: 400,
            message: "bad from".to_string()
        }
        .is_transient());
        assert!(!FetchError::Auth {
            status: 401,
            message: "invalid_client".to_string()
        }
        .is_transient());
    }
}
