//! Request bodies for the external model service.

use std::collections::BTreeMap;

use recordstore::{Record, RecordStore};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ranges::DateRangeConfig;
use crate::{DatasetError, Result};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Per-window record caps for outgoing payloads.
#[derive(Clone, Debug)]
pub struct PayloadLimits {
    pub training: usize,
    pub testing: usize,
    pub simulation: usize,
}

impl Default for PayloadLimits {
    fn default() -> Self {
        Self {
            training: 20_000,
            testing: 10_000,
            simulation: 10_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingPoint {
    pub timestamp: String,
    #[serde(rename = "response")]
    pub label: i32,
    pub features: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationPoint {
    pub timestamp: String,
    pub id: i64,
    #[serde(rename = "response")]
    pub label: i32,
    pub features: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRequest {
    pub train_start: String,
    pub train_end: String,
    pub test_start: String,
    pub test_end: String,
    pub training_data: Vec<TrainingPoint>,
    pub testing_data: Vec<TrainingPoint>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    pub simulation_start: String,
    pub simulation_end: String,
    pub data: Vec<SimulationPoint>,
}

impl From<Record> for TrainingPoint {
    fn from(r: Record) -> Self {
        Self {
            timestamp: r.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            label: r.label,
            features: r.features,
        }
    }
}

impl From<Record> for SimulationPoint {
    fn from(r: Record) -> Self {
        Self {
            timestamp: r.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            id: r.id,
            label: r.label,
            features: r.features,
        }
    }
}

fn ymd(d: chrono::NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub async fn assemble_training(
    config: &DateRangeConfig,
    store: &dyn RecordStore,
    limits: &PayloadLimits,
) -> Result<TrainingRequest> {
    let windows = config.parse()?;
    let generation = store.current_generation().await?.ok_or(DatasetError::NoDataset)?;

    let training = store.fetch_window(generation, windows.training, limits.training).await?;
    let testing = store.fetch_window(generation, windows.testing, limits.testing).await?;
    info!(
        %generation,
        training = training.len(),
        testing = testing.len(),
        "payload: training assembled"
    );

    Ok(TrainingRequest {
        train_start: ymd(windows.training.start),
        train_end: ymd(windows.training.end),
        test_start: ymd(windows.testing.start),
        test_end: ymd(windows.testing.end),
        training_data: training.into_iter().map(TrainingPoint::from).collect(),
        testing_data: testing.into_iter().map(TrainingPoint::from).collect(),
    })
}

pub async fn assemble_simulation(
    config: &DateRangeConfig,
    store: &dyn RecordStore,
    limits: &PayloadLimits,
) -> Result<SimulationRequest> {
    let windows = config.parse()?;
    let generation = store.current_generation().await?.ok_or(DatasetError::NoDataset)?;

    let data = store.fetch_window(generation, windows.simulation, limits.simulation).await?;
    info!(%generation, records = data.len(), "payload: simulation assembled");

    Ok(SimulationRequest {
        simulation_start: ymd(windows.simulation.start),
        simulation_end: ymd(windows.simulation.end),
        data: data.into_iter().map(SimulationPoint::from).collect(),
    })
}
