//! Record Store
//!
//! Durable table of ingested sensor records, scoped by dataset generation.
//! The store holds one live generation at a time; `reset` destroys every
//! record and opens the next generation.

mod memory;
mod store;
mod types;

pub use memory::InMemoryRecordStore;
pub use store::RecordStore;
pub use types::{DateSpan, Generation, NewRecord, Record};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Backend(String),

    #[error("Generation {requested} is no longer current (current: {current})")]
    StaleGeneration {
        requested: Generation,
        current: Generation,
    },

    #[error("Unknown generation {0}")]
    UnknownGeneration(Generation),
}

pub type Result<T> = std::result::Result<T, StoreError>;
