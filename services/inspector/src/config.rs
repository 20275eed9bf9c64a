use std::str::FromStr;

use anyhow::{bail, Context, Result};
use dataset::{IngestOptions, PayloadLimits, ValidatorOptions};

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Postgres connection string; without it records live in memory.
    pub database_url: Option<String>,
    pub ml_service_url: String,
    pub bind_addr: String,
    pub upload_dir: String,
    pub max_upload_bytes: usize,

    pub ingest: IngestOptions,
    pub validator: ValidatorOptions,
    pub payload_limits: PayloadLimits,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        let ml_service_url =
            lookup("ML_SERVICE_URL").unwrap_or_else(|| "http://ml-service:8000".to_string());
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let upload_dir = lookup("UPLOAD_DIR").unwrap_or_else(|| "data/uploads".to_string());
        let max_upload_bytes = parse_or(&lookup, "MAX_UPLOAD_BYTES", 1024 * 1024 * 1024)?;

        let defaults = IngestOptions::default();
        let ingest = IngestOptions {
            max_records: parse_or(&lookup, "INGEST_MAX_RECORDS", defaults.max_records)?,
            batch_size: parse_or(&lookup, "INGEST_BATCH_SIZE", defaults.batch_size)?,
            base_timestamp: None,
        };

        let validator = ValidatorOptions {
            detail_threshold: parse_or(
                &lookup,
                "BREAKDOWN_DETAIL_THRESHOLD",
                ValidatorOptions::default().detail_threshold,
            )?,
        };

        let limits = PayloadLimits::default();
        let payload_limits = PayloadLimits {
            training: parse_or(&lookup, "MAX_TRAINING_RECORDS", limits.training)?,
            testing: parse_or(&lookup, "MAX_TESTING_RECORDS", limits.testing)?,
            simulation: parse_or(&lookup, "MAX_SIMULATION_RECORDS", limits.simulation)?,
        };

        // Tiny sanity checks (fail fast, fail loud)
        if !ml_service_url.starts_with("http://") && !ml_service_url.starts_with("https://") {
            bail!("ML_SERVICE_URL must start with http:// or https://");
        }
        if ingest.batch_size == 0 {
            bail!("INGEST_BATCH_SIZE must be greater than zero");
        }
        if ingest.max_records == 0 {
            bail!("INGEST_MAX_RECORDS must be greater than zero");
        }

        Ok(Self {
            database_url,
            ml_service_url,
            bind_addr,
            upload_dir,
            max_upload_bytes,
            ingest,
            validator,
            payload_limits,
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value for env var {key}: {raw:?}")),
        None => Ok(default),
    }
}
