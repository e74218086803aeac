pub mod file;
pub mod stdout;
pub mod webhook;

use crate::config::types::SinkConfig;
use crate::ingest::{Batch, BatchConsumer};
use thiserror::Error;

pub use file::FileSink;
pub use stdout::StdoutSink;
pub use webhook::WebhookSink;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Build the consumer described by the `sink` config section
pub async fn build_sink(config: &SinkConfig) -> Result<Box<dyn BatchConsumer>, SinkError> {
    let sink: Box<dyn BatchConsumer> = match config {
        SinkConfig::Stdout => Box::new(StdoutSink::new()),
        SinkConfig::File { path } => Box::new(FileSink::open(path).await?),
        SinkConfig::Webhook { url, timeout } => Box::new(WebhookSink::new(url, *timeout)?),
    };
    Ok(sink)
}

/// One JSON payload per line
pub(crate) fn encode_ndjson(batch: &Batch) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    for record in batch.records() {
        serde_json::to_writer(&mut out, &record.payload)?;
        out.push(b'\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::record::LogRecord;
    use serde_json::json;

    #[test]
    fn test_ndjson_one_line_per_record() {
        let batch = Batch::new(vec![
            LogRecord::new("1", json!({"type": "s", "n": 1})),
            LogRecord::new("2", json!({"type": "f"})),
        ]);
        let encoded = String::from_utf8(encode_ndjson(&batch).unwrap()).unwrap();
        let lines: Vec<_> = encoded.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(lines[1]).unwrap(),
            json!({"type": "f"})
        );
    }
}
