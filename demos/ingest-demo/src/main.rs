//! Ingest demo
//!
//! Shows:
//! 1. A CSV is streamed into the in-memory record store
//! 2. The timeline is split into training / testing / simulation thirds
//! 3. The split is validated and broken down per month
//!
//! Usage: `ingest-demo [path/to/file.csv]`. Without a path a synthetic
//! sensor file is generated.

use std::io::Cursor;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use dataset::{ingest_csv, validate_date_ranges, DateRangeConfig, DateWindow, IngestOptions, ValidatorOptions};
use recordstore::{InMemoryRecordStore, RecordStore};

/// 4,000 rows of three sensor readings; every 50th label is garbage.
fn synthetic_csv() -> String {
    let mut csv = String::from("Id,temperature,pressure,humidity,Response\n");
    for i in 0..4_000u32 {
        let label = if i % 50 == 49 {
            "?".to_string()
        } else {
            ((i * 7 % 10 != 0) as u8).to_string()
        };
        // blank humidity on every 13th row
        let humidity = if i % 13 == 0 { String::new() } else { (40 + i % 20).to_string() };
        csv.push_str(&format!(
            "{i},{:.2},{:.1},{humidity},{label}\n",
            20.0 + (i % 17) as f64 * 0.3,
            1000.0 + (i % 31) as f64,
        ));
    }
    csv
}

/// Split `[start, end]` into three consecutive windows of roughly equal length.
fn thirds(start: NaiveDate, end: NaiveDate) -> DateRangeConfig {
    let total = (end - start).num_days();
    let third = (total / 3).max(0);
    let t_end = start + Duration::days(third);
    let te_start = (t_end + Duration::days(1)).min(end);
    let te_end = (te_start + Duration::days(third)).min(end);
    let s_start = (te_end + Duration::days(1)).min(end);
    let fmt = |d: NaiveDate| d.format("%Y-%m-%d").to_string();

    DateRangeConfig {
        training: DateWindow::new(fmt(start), fmt(t_end)),
        testing: DateWindow::new(fmt(te_start), fmt(te_end)),
        simulation: DateWindow::new(fmt(s_start), fmt(end)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("╔════════════════════════════════════════════════╗");
    println!("║  Sensor Dataset - Ingest & Window Demo         ║");
    println!("╚════════════════════════════════════════════════╝\n");

    let store = InMemoryRecordStore::new();

    // 1. Ingest
    println!("📥 Step 1: Ingest CSV");
    println!("   ─────────────────");

    let arg = std::env::args().nth(1);
    let summary = match &arg {
        Some(path) => {
            let file = std::fs::File::open(path).with_context(|| format!("Failed to open {path}"))?;
            let name = std::path::Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.clone());
            ingest_csv(std::io::BufReader::new(file), &name, &store, &IngestOptions::default()).await?
        }
        None => {
            let csv = synthetic_csv();
            ingest_csv(Cursor::new(csv.into_bytes()), "synthetic.csv", &store, &IngestOptions::default()).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    println!("   ✓ {} records stored, {} rows skipped\n", summary.total_records, summary.skipped_rows);

    // 2. Split
    println!("🗓  Step 2: Split timeline into thirds");
    println!("   ─────────────────────────────────");

    let generation = store
        .current_generation()
        .await?
        .context("no generation after ingest")?;
    let Some((min, max)) = store.timestamp_bounds(generation).await? else {
        println!("   ✗ Dataset is empty, nothing to split");
        return Ok(());
    };
    let config = thirds(min.date(), max.date());
    println!("{}\n", serde_json::to_string_pretty(&config)?);

    // 3. Validate
    println!("✓ Step 3: Validate windows");
    println!("   ───────────────────────");

    let result = validate_date_ranges(&config, &store, &ValidatorOptions::default()).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.is_valid {
        println!("   ✓ {}", result.message);
    } else {
        println!("   ✗ {}", result.message);
    }
    Ok(())
}
