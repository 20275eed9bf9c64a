//! Core record types

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Identifier of one ingested dataset. Strictly increasing across resets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(pub i64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A record as produced by ingestion, before the store assigns its id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    pub timestamp: NaiveDateTime,
    pub label: i32,
    pub features: BTreeMap<String, f64>,
}

/// A stored record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub timestamp: NaiveDateTime,
    pub label: i32,
    pub features: BTreeMap<String, f64>,
}

/// Inclusive calendar-date range. Time of day never takes part in comparisons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: &NaiveDateTime) -> bool {
        let d = ts.date();
        self.start <= d && d <= self.end
    }

    pub fn is_single_day(&self) -> bool {
        self.start == self.end
    }

    /// Both spans share at least one calendar day.
    pub fn overlaps(&self, other: &DateSpan) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn intersect(&self, other: &DateSpan) -> Option<DateSpan> {
        if !self.overlaps(other) {
            return None;
        }
        Some(DateSpan {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }
}
