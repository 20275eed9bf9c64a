use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use dataset::{validate_date_ranges, DateRangeConfig, DateWindow, ValidatorOptions};
use recordstore::{
    DateSpan, Generation, InMemoryRecordStore, NewRecord, Record, RecordStore, StoreError,
};

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

/// Fill a fresh generation with `n` records starting at `start`, `step` apart.
async fn seed(store: &InMemoryRecordStore, start: NaiveDateTime, n: usize, step: Duration) {
    let g = store.reset().await.unwrap();
    let records: Vec<NewRecord> = (0..n)
        .map(|i| NewRecord {
            timestamp: start + step * i as i32,
            label: (i % 2) as i32,
            features: Default::default(),
        })
        .collect();
    for chunk in records.chunks(1_000) {
        store.insert_batch(g, chunk).await.unwrap();
    }
}

fn config(t: (&str, &str), te: (&str, &str), s: (&str, &str)) -> DateRangeConfig {
    DateRangeConfig {
        training: DateWindow::new(t.0, t.1),
        testing: DateWindow::new(te.0, te.1),
        simulation: DateWindow::new(s.0, s.1),
    }
}

async fn validate(store: &InMemoryRecordStore, cfg: &DateRangeConfig) -> dataset::ValidationResult {
    validate_date_ranges(cfg, store, &ValidatorOptions::default()).await
}

#[tokio::test]
async fn test_sequential_windows_are_valid() {
    let store = InMemoryRecordStore::new();
    seed(&store, at(2024, 1, 1), 30 * 48, Duration::minutes(30)).await;

    let cfg = config(
        ("2024-01-01", "2024-01-10"),
        ("2024-01-11", "2024-01-20"),
        ("2024-01-21", "2024-01-30"),
    );
    let r = validate(&store, &cfg).await;

    assert!(r.is_valid, "{}", r.message);
    assert_eq!(r.training_records, 480);
    assert_eq!(r.testing_records, 480);
    assert_eq!(r.simulation_records, 480);
    assert!(r.message.contains("480"));
}

#[tokio::test]
async fn test_overlapping_training_and_testing_rejected() {
    let store = InMemoryRecordStore::new();
    seed(&store, at(2024, 1, 1), 30 * 48, Duration::minutes(30)).await;

    let cfg = config(
        ("2024-01-01", "2024-01-10"),
        ("2024-01-05", "2024-01-15"),
        ("2024-01-16", "2024-01-20"),
    );
    let r = validate(&store, &cfg).await;

    assert!(!r.is_valid);
    assert!(r.message.contains("overlap"));
}

#[tokio::test]
async fn test_small_dataset_tolerates_overlap() {
    let store = InMemoryRecordStore::new();
    seed(&store, at(2024, 1, 1), 10, Duration::minutes(30)).await;

    let day = ("2024-01-01", "2024-01-01");
    let r = validate(&store, &config(day, day, day)).await;

    assert!(r.is_valid, "{}", r.message);
    assert_eq!(r.training_records, 10);
    assert_eq!(r.testing_records, 10);
    assert_eq!(r.simulation_records, 10);
}

#[tokio::test]
async fn test_small_dataset_still_needs_training_records() {
    let store = InMemoryRecordStore::new();
    seed(&store, at(2024, 1, 2), 10, Duration::minutes(30)).await;

    let day = ("2024-01-01", "2024-01-01");
    let r = validate(&store, &config(day, day, day)).await;

    assert!(!r.is_valid);
    assert!(r.message.contains("training"));
}

#[tokio::test]
async fn test_small_dataset_tolerates_empty_testing_and_simulation() {
    let store = InMemoryRecordStore::new();
    seed(&store, at(2024, 1, 1), 10, Duration::minutes(30)).await;

    let cfg = config(
        ("2024-01-01", "2024-01-01"),
        ("2024-01-02", "2024-01-02"),
        ("2024-01-03", "2024-01-03"),
    );
    let r = validate(&store, &cfg).await;

    assert!(r.is_valid, "{}", r.message);
    assert_eq!(r.testing_records, 0);
    assert_eq!(r.simulation_records, 0);
}

#[tokio::test]
async fn test_empty_testing_rejected_for_regular_dataset() {
    let store = InMemoryRecordStore::new();
    seed(&store, at(2024, 1, 1), 10 * 48, Duration::minutes(30)).await;

    let cfg = config(
        ("2024-01-01", "2024-01-05"),
        ("2024-02-01", "2024-02-05"),
        ("2024-02-06", "2024-02-10"),
    );
    let r = validate(&store, &cfg).await;

    assert!(!r.is_valid);
    assert!(r.message.contains("testing"));
    assert_eq!(r.training_records, 5 * 48);
}

#[tokio::test]
async fn test_empty_simulation_rejected_for_regular_dataset() {
    let store = InMemoryRecordStore::new();
    seed(&store, at(2024, 1, 1), 10 * 48, Duration::minutes(30)).await;

    let cfg = config(
        ("2024-01-01", "2024-01-04"),
        ("2024-01-05", "2024-01-08"),
        ("2024-02-01", "2024-02-05"),
    );
    let r = validate(&store, &cfg).await;

    assert!(!r.is_valid);
    assert!(r.message.contains("simulation"), "{}", r.message);
    assert_eq!(r.training_records, 4 * 48);
    assert_eq!(r.testing_records, 4 * 48);
    assert_eq!(r.simulation_records, 0);
}

#[tokio::test]
async fn test_invalid_date_format() {
    let store = InMemoryRecordStore::new();
    seed(&store, at(2024, 1, 1), 10, Duration::minutes(30)).await;

    let cfg = config(("not-a-date", "2024-01-01"), ("2024-01-02", "2024-01-02"), ("2024-01-03", "2024-01-03"));
    let r = validate(&store, &cfg).await;

    assert!(!r.is_valid);
    assert_eq!(r.message, "Invalid date format provided");
}

#[tokio::test]
async fn test_window_start_after_end() {
    let store = InMemoryRecordStore::new();
    seed(&store, at(2024, 1, 1), 10, Duration::minutes(30)).await;

    let cfg = config(("2024-01-01", "2024-01-02"), ("2024-01-09", "2024-01-03"), ("2024-01-10", "2024-01-11"));
    let r = validate(&store, &cfg).await;

    assert!(!r.is_valid);
    assert!(r.message.starts_with("Testing"));
}

#[tokio::test]
async fn test_reversed_single_day_windows_rejected() {
    let store = InMemoryRecordStore::new();
    seed(&store, at(2024, 1, 1), 4 * 48, Duration::minutes(30)).await;

    let cfg = config(("2024-01-01", "2024-01-01"), ("2024-01-03", "2024-01-03"), ("2024-01-02", "2024-01-02"));
    let r = validate(&store, &cfg).await;

    assert!(!r.is_valid);
    assert!(r.message.contains("same date"));
}

#[tokio::test]
async fn test_no_dataset_uploaded() {
    let store = InMemoryRecordStore::new();
    let day = ("2024-01-01", "2024-01-01");

    let r = validate(&store, &config(day, day, day)).await;

    assert!(!r.is_valid);
    assert_eq!(r.message, "No dataset has been uploaded");
}

#[tokio::test]
async fn test_time_of_day_in_input_is_ignored() {
    let store = InMemoryRecordStore::new();
    seed(&store, at(2024, 1, 1), 10 * 48, Duration::minutes(30)).await;

    let cfg = config(
        ("2024-01-01T15:00:00Z", "2024-01-03T01:00:00Z"),
        ("2024-01-04T00:00:00", "2024-01-06T00:00:00"),
        ("2024-01-07", "2024-01-09"),
    );
    let r = validate(&store, &cfg).await;

    assert!(r.is_valid, "{}", r.message);
    assert_eq!(r.training_records, 3 * 48);
}

#[tokio::test]
async fn test_detailed_breakdown_over_three_months() {
    let store = InMemoryRecordStore::new();
    // one record per day, Jan 1 .. Mar 31 2024
    seed(&store, at(2024, 1, 1), 91, Duration::days(1)).await;

    let cfg = config(
        ("2024-01-10", "2024-02-10"),
        ("2024-02-11", "2024-03-05"),
        ("2024-03-06", "2024-03-20"),
    );
    let r = validate(&store, &cfg).await;

    assert!(r.is_valid, "{}", r.message);
    let months: Vec<&str> = r.monthly_breakdown.iter().map(|b| b.month.as_str()).collect();
    assert_eq!(months, vec!["Jan 2024", "Feb 2024", "Mar 2024"]);

    let sum = |f: fn(&dataset::MonthlyBucket) -> u64| r.monthly_breakdown.iter().map(f).sum::<u64>();
    assert_eq!(sum(|b| b.training), r.training_records);
    assert_eq!(sum(|b| b.testing), r.testing_records);
    assert_eq!(sum(|b| b.simulation), r.simulation_records);

    assert_eq!(r.monthly_breakdown[0].training, 22);
    assert_eq!(r.monthly_breakdown[1].training, 10);
    assert_eq!(r.monthly_breakdown[1].testing, 19);
    assert_eq!(r.monthly_breakdown[2].testing, 5);
    assert_eq!(r.monthly_breakdown[2].simulation, 15);
}

#[tokio::test]
async fn test_simplified_breakdown_for_large_totals() {
    let store = InMemoryRecordStore::new();
    seed(&store, at(2024, 1, 1), 12_000, Duration::minutes(30)).await;

    let cfg = config(
        ("2024-01-01", "2024-04-30"),
        ("2024-05-01", "2024-06-30"),
        ("2024-07-01", "2024-08-31"),
    );
    let r = validate(&store, &cfg).await;

    assert!(r.is_valid, "{}", r.message);
    assert!(r.training_records + r.testing_records + r.simulation_records > 10_000);
    assert_eq!(r.monthly_breakdown.len(), 3);

    let b = &r.monthly_breakdown;
    assert_eq!((b[0].month.as_str(), b[0].training), ("Jan 2024", r.training_records));
    assert_eq!((b[1].month.as_str(), b[1].testing), ("May 2024", r.testing_records));
    assert_eq!((b[2].month.as_str(), b[2].simulation), ("Jul 2024", r.simulation_records));
}

#[tokio::test]
async fn test_simplified_breakdown_merges_shared_start_month() {
    let store = InMemoryRecordStore::new();
    seed(&store, at(2024, 1, 1), 40 * 48, Duration::minutes(30)).await;

    let cfg = config(
        ("2024-01-01", "2024-01-10"),
        ("2024-01-11", "2024-01-20"),
        ("2024-02-01", "2024-02-05"),
    );
    let opts = ValidatorOptions { detail_threshold: 100 };
    let r = validate_date_ranges(&cfg, &store, &opts).await;

    assert!(r.is_valid, "{}", r.message);
    assert_eq!(r.monthly_breakdown.len(), 2);
    assert_eq!(r.monthly_breakdown[0].training, 480);
    assert_eq!(r.monthly_breakdown[0].testing, 480);
    assert_eq!(r.monthly_breakdown[1].simulation, 5 * 48);
}

#[tokio::test]
async fn test_validation_is_idempotent() {
    let store = InMemoryRecordStore::new();
    seed(&store, at(2024, 1, 1), 91, Duration::days(1)).await;

    let cfg = config(
        ("2024-01-01", "2024-01-31"),
        ("2024-02-01", "2024-02-29"),
        ("2024-03-01", "2024-03-31"),
    );
    let first = validate(&store, &cfg).await;
    let second = validate(&store, &cfg).await;

    assert_eq!(first, second);
    assert_eq!(first.monthly_breakdown.len(), 3);
}

struct UnreachableStore;

#[async_trait]
impl RecordStore for UnreachableStore {
    async fn reset(&self) -> recordstore::Result<Generation> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    async fn current_generation(&self) -> recordstore::Result<Option<Generation>> {
        Ok(Some(Generation(1)))
    }

    async fn insert_batch(&self, _: Generation, _: &[NewRecord]) -> recordstore::Result<()> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    async fn count_between(&self, _: Generation, _: DateSpan) -> recordstore::Result<u64> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    async fn timestamp_bounds(
        &self,
        _: Generation,
    ) -> recordstore::Result<Option<(NaiveDateTime, NaiveDateTime)>> {
        Ok(None)
    }

    async fn fetch_window(&self, _: Generation, _: DateSpan, _: usize) -> recordstore::Result<Vec<Record>> {
        Ok(vec![])
    }
}

#[tokio::test]
async fn test_store_failure_is_reported_not_raised() {
    let cfg = config(
        ("2024-01-01", "2024-01-10"),
        ("2024-01-11", "2024-01-20"),
        ("2024-01-21", "2024-01-30"),
    );
    let r = validate_date_ranges(&cfg, &UnreachableStore, &ValidatorOptions::default()).await;

    assert!(!r.is_valid);
    assert!(r.message.contains("connection refused"));
}
