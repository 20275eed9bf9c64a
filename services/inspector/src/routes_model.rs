use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use dataset::{assemble_training, DateRangeConfig};
use tracing::{error, info};

use crate::routes_dataset::{api_error, dataset_error, ApiError};
use crate::state::SharedState;
use crate::types_ml::TrainingResult;

pub async fn train_model(
    State(state): State<SharedState>,
    Json(config): Json<DateRangeConfig>,
) -> Result<Json<TrainingResult>, ApiError> {
    let req = assemble_training(&config, state.store.as_ref(), &state.cfg.payload_limits)
        .await
        .map_err(dataset_error)?;

    info!(
        training = req.training_data.len(),
        testing = req.testing_data.len(),
        "train: forwarding to model service"
    );

    let result = state.ml.train(&req).await.map_err(|e| {
        error!("train: model service failed: {e:?}");
        api_error(StatusCode::BAD_GATEWAY, "An error occurred while training the model")
    })?;

    info!(accuracy = result.accuracy, f1 = result.f1_score, "train: completed");
    Ok(Json(result))
}
