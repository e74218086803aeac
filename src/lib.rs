pub mod cli;
pub mod config;
pub mod ingest;
pub mod sink;
pub mod source;
pub mod storage;
