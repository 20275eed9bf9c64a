use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

use chrono::{Duration, Months, NaiveDateTime, Utc};
use csv::{StringRecord, Trim};
use recordstore::{Generation, NewRecord, RecordStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{DatasetError, Result};

/// Reserved header of the pass/fail column.
pub const LABEL_COLUMN: &str = "Response";

pub const DEFAULT_MAX_RECORDS: usize = 100_000;
pub const DEFAULT_BATCH_SIZE: usize = 1_000;

/// Spacing between consecutive synthetic timestamps.
const ROW_INTERVAL_MINUTES: i64 = 30;

#[derive(Clone, Debug)]
pub struct IngestOptions {
    /// Data rows read past this count are ignored.
    pub max_records: usize,
    pub batch_size: usize,
    /// First synthetic timestamp; defaults to one year before ingestion start.
    pub base_timestamp: Option<NaiveDateTime>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
            batch_size: DEFAULT_BATCH_SIZE,
            base_timestamp: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRangeSummary {
    pub start: String,
    pub end: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub file_name: String,
    pub total_records: u64,
    pub total_columns: usize,
    pub pass_rate: f64,
    pub date_range: DateRangeSummary,
    /// Rows dropped because their label was missing or not an integer.
    pub skipped_rows: u64,
    /// Rows remained in the file after the record cap was reached.
    pub truncated: bool,
    pub generation: Generation,
}

/// Header layout resolved from the first CSV row.
struct Columns {
    label: usize,
    features: Vec<(usize, String)>,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Result<Self> {
        if headers.iter().all(|h| strip_bom(h).is_empty()) {
            return Err(DatasetError::Format(
                "The uploaded file is empty or has no header row".to_string(),
            ));
        }

        let label = headers
            .iter()
            .position(|h| strip_bom(h).eq_ignore_ascii_case(LABEL_COLUMN))
            .ok_or_else(|| {
                DatasetError::Format(format!("CSV must contain a '{LABEL_COLUMN}' column"))
            })?;

        let features: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != label)
            .map(|(i, h)| (i, strip_bom(h).to_string()))
            .collect();

        // feature values are keyed by name, a repeated header would drop a column
        let mut seen = BTreeSet::new();
        if let Some((_, dup)) = features.iter().find(|(_, name)| !seen.insert(name.as_str())) {
            return Err(DatasetError::Format(format!("Duplicate column name '{dup}'")));
        }

        Ok(Self { label, features })
    }
}

fn strip_bom(s: &str) -> &str {
    s.trim_start_matches('\u{feff}').trim()
}

fn parse_label(cell: Option<&str>) -> Option<i32> {
    cell?.trim().parse::<i32>().ok()
}

/// Blank, unparsable and non-finite cells become 0.0.
fn parse_feature(cell: Option<&str>) -> f64 {
    cell.and_then(|c| c.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

fn default_base() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.checked_sub_months(Months::new(12)).unwrap_or(now)
}

async fn flush_batch(
    store: &dyn RecordStore,
    generation: Generation,
    buffer: &mut Vec<NewRecord>,
    batch_no: usize,
) -> Result<()> {
    store
        .insert_batch(generation, buffer)
        .await
        .map_err(|source| DatasetError::Persistence {
            context: format!("Failed to insert batch {batch_no}"),
            source,
        })?;
    debug!(%generation, batch_no, rows = buffer.len(), "ingest: batch flushed");
    buffer.clear();
    Ok(())
}

/// Stream a CSV upload into `store`, replacing whatever dataset it held.
///
/// Rows whose label is not an integer are skipped; feature cells that do not
/// parse are stored as 0.0. Each stored row gets a synthetic timestamp 30
/// minutes after the previous one. Rows are written in batches of
/// `opts.batch_size`; a failed batch aborts ingestion and leaves earlier
/// batches in place.
pub async fn ingest_csv<R: Read + Send>(
    reader: R,
    file_name: &str,
    store: &dyn RecordStore,
    opts: &IngestOptions,
) -> Result<DatasetSummary> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let columns = Columns::resolve(&headers)?;

    let generation = store
        .reset()
        .await
        .map_err(|source| DatasetError::Persistence {
            context: "Failed to clear previous dataset".to_string(),
            source,
        })?;

    let base = opts.base_timestamp.unwrap_or_else(default_base);
    let batch_size = opts.batch_size.max(1);
    info!(file_name, %generation, features = columns.features.len(), %base, "ingest: started");

    let mut buffer: Vec<NewRecord> = Vec::with_capacity(batch_size);
    let mut row = StringRecord::new();
    let mut batch_no: usize = 0;

    let mut rows_read: usize = 0;
    let mut stored: u64 = 0;
    let mut skipped: u64 = 0;
    let mut passes: u64 = 0;
    let mut bounds: Option<(NaiveDateTime, NaiveDateTime)> = None;
    let mut truncated = false;

    loop {
        if rows_read >= opts.max_records {
            truncated = rdr.read_record(&mut row).unwrap_or(false);
            break;
        }

        match rdr.read_record(&mut row) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) if matches!(e.kind(), csv::ErrorKind::Utf8 { .. }) => {
                rows_read += 1;
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        }
        rows_read += 1;

        let Some(label) = parse_label(row.get(columns.label)) else {
            skipped += 1;
            continue;
        };

        let features: BTreeMap<String, f64> = columns
            .features
            .iter()
            .map(|(i, name)| (name.clone(), parse_feature(row.get(*i))))
            .collect();

        let timestamp = base + Duration::minutes(ROW_INTERVAL_MINUTES * stored as i64);
        bounds = Some(match bounds {
            Some((lo, hi)) => (lo.min(timestamp), hi.max(timestamp)),
            None => (timestamp, timestamp),
        });
        if label == 1 {
            passes += 1;
        }

        buffer.push(NewRecord {
            timestamp,
            label,
            features,
        });
        stored += 1;

        if buffer.len() >= batch_size {
            batch_no += 1;
            flush_batch(store, generation, &mut buffer, batch_no).await?;
        }
    }

    if !buffer.is_empty() {
        batch_no += 1;
        flush_batch(store, generation, &mut buffer, batch_no).await?;
    }

    if truncated {
        warn!(
            file_name,
            cap = opts.max_records,
            "ingest: record cap reached, remaining rows ignored"
        );
    }
    if skipped > 0 {
        warn!(file_name, skipped, "ingest: rows without an integer label were skipped");
    }

    let pass_rate = if stored == 0 {
        0.0
    } else {
        round4(passes as f64 / stored as f64)
    };

    let date_range = bounds
        .map(|(lo, hi)| DateRangeSummary {
            start: lo.date().format("%Y-%m-%d").to_string(),
            end: hi.date().format("%Y-%m-%d").to_string(),
        })
        .unwrap_or_default();

    info!(
        file_name,
        %generation,
        records = stored,
        skipped,
        batches = batch_no,
        pass_rate,
        "ingest: complete"
    );

    Ok(DatasetSummary {
        file_name: file_name.to_string(),
        total_records: stored,
        total_columns: columns.features.len() + 1,
        pass_rate,
        date_range,
        skipped_rows: skipped,
        truncated,
        generation,
    })
}
