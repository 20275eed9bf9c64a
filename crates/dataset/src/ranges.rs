use chrono::{DateTime, NaiveDate, NaiveDateTime};
use recordstore::{DateSpan, Generation, RecordStore, StoreError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::breakdown::strategy_for;
use crate::{DatasetError, Result};

/// Overall spans of at most this many days relax the overlap and emptiness rules.
pub const SMALL_DATASET_MAX_DAYS: i64 = 3;

/// Above this many windowed records the breakdown is attributed per window start month.
pub const DEFAULT_DETAIL_THRESHOLD: u64 = 10_000;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateWindow {
    pub start_date: String,
    pub end_date: String,
}

impl DateWindow {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start_date: start.into(),
            end_date: end.into(),
        }
    }

    fn parse(&self) -> Option<DateSpan> {
        Some(DateSpan::new(parse_date(&self.start_date)?, parse_date(&self.end_date)?))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRangeConfig {
    pub training: DateWindow,
    pub testing: DateWindow,
    pub simulation: DateWindow,
}

impl DateRangeConfig {
    pub fn parse(&self) -> Result<ParsedWindows> {
        Ok(ParsedWindows {
            training: self.training.parse().ok_or(DatasetError::InvalidDates)?,
            testing: self.testing.parse().ok_or(DatasetError::InvalidDates)?,
            simulation: self.simulation.parse().ok_or(DatasetError::InvalidDates)?,
        })
    }
}

/// The three windows at calendar-date granularity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParsedWindows {
    pub training: DateSpan,
    pub testing: DateSpan,
    pub simulation: DateSpan,
}

impl ParsedWindows {
    fn ordering_error(&self) -> Option<&'static str> {
        if self.training.start > self.training.end {
            return Some("Training start date must be on or before its end date");
        }
        if self.testing.start > self.testing.end {
            return Some("Testing start date must be on or before its end date");
        }
        if self.simulation.start > self.simulation.end {
            return Some("Simulation start date must be on or before its end date");
        }
        None
    }

    pub fn is_small_dataset(&self) -> bool {
        (self.simulation.end - self.training.start).num_days() <= SMALL_DATASET_MAX_DAYS
    }

    /// Two single-day testing/simulation windows must share their day or run
    /// testing first. A simulation day that falls before the testing day is
    /// rejected even though the two windows do not overlap.
    fn single_day_mismatch(&self) -> bool {
        self.testing.is_single_day()
            && self.simulation.is_single_day()
            && self.testing.start != self.simulation.start
            && self.simulation.start < self.testing.start
    }

    /// Earliest and latest boundary over all three windows.
    pub fn envelope(&self) -> DateSpan {
        let spans = [self.training, self.testing, self.simulation];
        let start = spans.iter().map(|s| s.start).min().unwrap_or(self.training.start);
        let end = spans.iter().map(|s| s.end).max().unwrap_or(self.simulation.end);
        DateSpan::new(start, end)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowCounts {
    pub training: u64,
    pub testing: u64,
    pub simulation: u64,
}

impl WindowCounts {
    pub fn total(&self) -> u64 {
        self.training + self.testing + self.simulation
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyBucket {
    pub month: String,
    pub training: u64,
    pub testing: u64,
    pub simulation: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub message: String,
    pub training_records: u64,
    pub testing_records: u64,
    pub simulation_records: u64,
    pub monthly_breakdown: Vec<MonthlyBucket>,
}

impl ValidationResult {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: message.into(),
            ..Default::default()
        }
    }

    fn with_counts(mut self, counts: WindowCounts) -> Self {
        self.training_records = counts.training;
        self.testing_records = counts.testing;
        self.simulation_records = counts.simulation;
        self
    }
}

#[derive(Clone, Debug)]
pub struct ValidatorOptions {
    pub detail_threshold: u64,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            detail_threshold: DEFAULT_DETAIL_THRESHOLD,
        }
    }
}

/// Accepts `YYYY-MM-DD`, RFC 3339 instants and `YYYY-MM-DDTHH:MM:SS[.f]`.
/// Only the calendar date is kept.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
}

pub async fn count_windows(
    store: &dyn RecordStore,
    generation: Generation,
    windows: &ParsedWindows,
) -> std::result::Result<WindowCounts, StoreError> {
    Ok(WindowCounts {
        training: store.count_between(generation, windows.training).await?,
        testing: store.count_between(generation, windows.testing).await?,
        simulation: store.count_between(generation, windows.simulation).await?,
    })
}

/// Validate the three windows against the live dataset.
///
/// Never fails: malformed input and store errors alike come back as
/// `is_valid == false` with a human-readable message.
pub async fn validate_date_ranges(
    config: &DateRangeConfig,
    store: &dyn RecordStore,
    opts: &ValidatorOptions,
) -> ValidationResult {
    match run_checks(config, store, opts).await {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "validate: store query failed");
            ValidationResult::invalid(e.to_string())
        }
    }
}

async fn run_checks(
    config: &DateRangeConfig,
    store: &dyn RecordStore,
    opts: &ValidatorOptions,
) -> std::result::Result<ValidationResult, StoreError> {
    let Ok(windows) = config.parse() else {
        return Ok(ValidationResult::invalid("Invalid date format provided"));
    };

    if let Some(msg) = windows.ordering_error() {
        return Ok(ValidationResult::invalid(msg));
    }

    let small = windows.is_small_dataset();

    if !small && windows.training.overlaps(&windows.testing) {
        return Ok(ValidationResult::invalid(
            "Training and testing periods must not overlap",
        ));
    }

    if windows.single_day_mismatch() {
        return Ok(ValidationResult::invalid(
            "Single-day testing and simulation periods should use the same date or be sequential",
        ));
    }

    let Some(generation) = store.current_generation().await? else {
        return Ok(ValidationResult::invalid("No dataset has been uploaded"));
    };

    let counts = count_windows(store, generation, &windows).await?;
    debug!(%generation, ?counts, small, "validate: window counts");

    if counts.training == 0 {
        let msg = "No records found in the training period";
        return Ok(ValidationResult::invalid(msg).with_counts(counts));
    }
    if !small && counts.testing == 0 {
        let msg = "No records found in the testing period";
        return Ok(ValidationResult::invalid(msg).with_counts(counts));
    }
    if !small && counts.simulation == 0 {
        let msg = "No records found in the simulation period";
        return Ok(ValidationResult::invalid(msg).with_counts(counts));
    }

    let strategy = strategy_for(counts.total(), opts.detail_threshold);
    let monthly_breakdown = strategy.buckets(store, generation, &windows, &counts).await?;

    Ok(ValidationResult {
        is_valid: true,
        message: format!(
            "Date ranges validated successfully. \
             Training: {} records, Testing: {} records, Simulation: {} records",
            counts.training, counts.testing, counts.simulation
        ),
        training_records: counts.training,
        testing_records: counts.testing,
        simulation_records: counts.simulation,
        monthly_breakdown,
    })
}
