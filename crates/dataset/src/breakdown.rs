//! Monthly distribution of the three windows.
//!
//! Both strategies assign window counts to calendar-month buckets; they differ
//! in cost. [`CalendarMonthBuckets`] runs three range counts per month in the
//! overall span. [`WindowStartBuckets`] issues no queries and attributes each
//! window's whole count to the month it starts in.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Datelike, Months, NaiveDate};
use recordstore::{DateSpan, Generation, RecordStore, StoreError};

use crate::ranges::{MonthlyBucket, ParsedWindows, WindowCounts};

#[async_trait]
pub trait BucketStrategy: Send + Sync {
    /// Buckets in chronological order.
    async fn buckets(
        &self,
        store: &dyn RecordStore,
        generation: Generation,
        windows: &ParsedWindows,
        counts: &WindowCounts,
    ) -> Result<Vec<MonthlyBucket>, StoreError>;
}

/// Pick the per-month strategy unless the windowed total exceeds `threshold`.
pub fn strategy_for(total: u64, threshold: u64) -> Box<dyn BucketStrategy> {
    if total > threshold {
        Box::new(WindowStartBuckets)
    } else {
        Box::new(CalendarMonthBuckets)
    }
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// The whole calendar month beginning at `first`.
pub fn month_span(first: NaiveDate) -> DateSpan {
    let end = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(first);
    DateSpan::new(first, end)
}

pub fn month_label(first: NaiveDate) -> String {
    first.format("%b %Y").to_string()
}

/// First day of every month touched by `span`, in order.
pub fn months_in(span: DateSpan) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut cur = month_start(span.start);
    while cur <= span.end {
        out.push(cur);
        match cur.checked_add_months(Months::new(1)) {
            Some(next) => cur = next,
            None => break,
        }
    }
    out
}

pub struct WindowStartBuckets;

#[async_trait]
impl BucketStrategy for WindowStartBuckets {
    async fn buckets(
        &self,
        _store: &dyn RecordStore,
        _generation: Generation,
        windows: &ParsedWindows,
        counts: &WindowCounts,
    ) -> Result<Vec<MonthlyBucket>, StoreError> {
        let mut by_month: BTreeMap<NaiveDate, MonthlyBucket> = BTreeMap::new();

        by_month
            .entry(month_start(windows.training.start))
            .or_insert_with(|| empty_bucket(windows.training.start))
            .training += counts.training;
        by_month
            .entry(month_start(windows.testing.start))
            .or_insert_with(|| empty_bucket(windows.testing.start))
            .testing += counts.testing;
        by_month
            .entry(month_start(windows.simulation.start))
            .or_insert_with(|| empty_bucket(windows.simulation.start))
            .simulation += counts.simulation;

        Ok(by_month.into_values().collect())
    }
}

fn empty_bucket(day: NaiveDate) -> MonthlyBucket {
    MonthlyBucket {
        month: month_label(month_start(day)),
        ..Default::default()
    }
}

pub struct CalendarMonthBuckets;

async fn count_within(
    store: &dyn RecordStore,
    generation: Generation,
    window: &DateSpan,
    month: &DateSpan,
) -> Result<u64, StoreError> {
    match window.intersect(month) {
        Some(span) => store.count_between(generation, span).await,
        None => Ok(0),
    }
}

#[async_trait]
impl BucketStrategy for CalendarMonthBuckets {
    async fn buckets(
        &self,
        store: &dyn RecordStore,
        generation: Generation,
        windows: &ParsedWindows,
        _counts: &WindowCounts,
    ) -> Result<Vec<MonthlyBucket>, StoreError> {
        let months = months_in(windows.envelope());
        let mut out = Vec::with_capacity(months.len());

        for first in months {
            let span = month_span(first);
            out.push(MonthlyBucket {
                month: month_label(first),
                training: count_within(store, generation, &windows.training, &span).await?,
                testing: count_within(store, generation, &windows.testing, &span).await?,
                simulation: count_within(store, generation, &windows.simulation, &span).await?,
            });
        }
        Ok(out)
    }
}
