pub mod fetcher;
pub mod http;
pub mod record;

pub use fetcher::{FetchError, LogFetcher};
pub use http::HttpLogSource;
pub use record::{LogPage, LogRecord};
