pub mod duckdb;
pub mod memory;
pub mod traits;

pub use duckdb::DuckDbCheckpointStore;
pub use memory::MemoryCheckpointStore;
pub use traits::{CheckpointStore, StorageError};
