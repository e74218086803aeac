use serde::{Deserialize, Serialize};

/// One log entry pulled from the remote source.
///
/// `position` is the cursor value the source hands back on the next fetch;
/// positions within a run are strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub position: String,
    pub payload: serde_json::Value,
}

impl LogRecord {
    pub fn new(position: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            position: position.into(),
            payload,
        }
    }
}

/// One fetch call's worth of records.
#[derive(Debug, Clone, Default)]
pub struct LogPage {
    /// Records in source order. Empty means the source is exhausted.
    pub records: Vec<LogRecord>,

    /// Source judged the page stale or partial without failing the request
    pub outdated: bool,
}

impl LogPage {
    pub fn new(records: Vec<LogRecord>) -> Self {
        Self {
            records,
            outdated: false,
        }
    }

    pub fn outdated(records: Vec<LogRecord>) -> Self {
        Self {
            records,
            outdated: true,
        }
    }

    pub fn exhausted() -> Self {
        Self::default()
    }

    pub fn is_exhausted(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last_position(&self) -> Option<&str> {
        self.records.last().map(|r| r.position.as_str())
    }
}
