//! Dataset ingestion and timeline windowing.
//!
//! - [`ingest`]: streaming CSV parse, synthetic timestamps, batched persistence.
//! - [`ranges`]: training/testing/simulation window validation.
//! - [`breakdown`]: per-month record distribution of the three windows.
//! - [`payload`]: windowed record payloads for the external model service.

pub mod breakdown;
pub mod ingest;
pub mod payload;
pub mod ranges;

pub use breakdown::{BucketStrategy, CalendarMonthBuckets, WindowStartBuckets};
pub use ingest::{ingest_csv, DatasetSummary, DateRangeSummary, IngestOptions, LABEL_COLUMN};
pub use payload::{
    assemble_simulation, assemble_training, PayloadLimits, SimulationRequest, TrainingRequest,
};
pub use ranges::{
    validate_date_ranges, DateRangeConfig, DateWindow, MonthlyBucket, ParsedWindows,
    ValidationResult, ValidatorOptions, WindowCounts,
};

use recordstore::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    /// The upload cannot be ingested at all (empty, no header, no label column).
    #[error("{0}")]
    Format(String),

    /// A write to the record store failed; ingestion stopped at this point.
    #[error("{context}: {source}")]
    Persistence {
        context: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid date format provided")]
    InvalidDates,

    #[error("No dataset has been uploaded")]
    NoDataset,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DatasetError {
    /// Errors caused by the caller's input rather than by infrastructure.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            DatasetError::Format(_)
                | DatasetError::Csv(_)
                | DatasetError::InvalidDates
                | DatasetError::NoDataset
        )
    }
}

pub type Result<T> = std::result::Result<T, DatasetError>;
