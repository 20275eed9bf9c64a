use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use dataset::{assemble_simulation, DateRangeConfig};
use tracing::{error, info, warn};

use crate::routes_dataset::{api_error, dataset_error, ApiError};
use crate::state::SharedState;
use crate::types_ml::{SimulationResult, SimulationStats};

pub async fn start_simulation(
    State(state): State<SharedState>,
    Json(config): Json<DateRangeConfig>,
) -> Result<Json<Vec<SimulationResult>>, ApiError> {
    let req = assemble_simulation(&config, state.store.as_ref(), &state.cfg.payload_limits)
        .await
        .map_err(dataset_error)?;

    info!(records = req.data.len(), "simulate: forwarding to model service");

    let results = state.ml.simulate(&req).await.map_err(|e| {
        error!("simulate: model service failed: {e:?}");
        api_error(StatusCode::BAD_GATEWAY, "An error occurred while starting the simulation")
    })?;

    info!(results = results.len(), "simulate: completed");
    Ok(Json(results))
}

/// Zeroed stats when the model service cannot be reached.
pub async fn simulation_stats(State(state): State<SharedState>) -> Json<SimulationStats> {
    match state.ml.stats().await {
        Ok(stats) => Json(stats),
        Err(e) => {
            warn!("stats: model service failed: {e:?}");
            Json(SimulationStats::default())
        }
    }
}
