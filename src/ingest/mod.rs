//! The ingestion loop: pull pages from a checkpoint, batch them, hand each
//! batch to a consumer, and stop on exhaustion, time budget, or errors.

pub mod accumulator;
pub mod budget;
pub mod consumer;
pub mod cursor;
pub mod runner;
pub mod status;

pub use accumulator::{Batch, BatchAccumulator};
pub use budget::RunBudget;
pub use consumer::{from_fn, BatchConsumer, ConsumerError, FnConsumer};
pub use cursor::CheckpointCursor;
pub use runner::{IngestConfig, IngestError, IngestRunner};
pub use status::{
    ErrorAccumulator, RunError, RunErrorKind, RunErrors, RunOutcome, RunStatus, StopReason,
    MAX_RUN_ERRORS,
};
