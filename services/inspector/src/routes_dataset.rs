use std::path::{Path, PathBuf};

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use dataset::{
    ingest_csv, validate_date_ranges, DatasetError, DatasetSummary, DateRangeConfig,
    ValidationResult,
};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::state::SharedState;

pub type ApiError = (StatusCode, Json<serde_json::Value>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "message": message.into() })))
}

pub fn is_csv_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".csv")
}

/// Map a dataset failure onto the HTTP contract: caller mistakes are 400,
/// everything else is 500.
pub fn dataset_error(e: DatasetError) -> ApiError {
    if e.is_rejection() {
        warn!(error = %e, "request rejected");
        api_error(StatusCode::BAD_REQUEST, e.to_string())
    } else {
        error!(error = %e, "dataset operation failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

struct SavedUpload {
    file_name: String,
    path: PathBuf,
    bytes: u64,
}

/// Stream the `file` field to disk chunk by chunk.
async fn save_upload(mp: &mut Multipart, dir: &Path) -> Result<Option<SavedUpload>, ApiError> {
    let bad_request = |e: axum::extract::multipart::MultipartError| {
        api_error(StatusCode::BAD_REQUEST, e.to_string())
    };
    let io_error = |e: std::io::Error| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());

    while let Some(mut field) = mp.next_field().await.map_err(bad_request)? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if !is_csv_name(&file_name) {
            return Err(api_error(StatusCode::BAD_REQUEST, "Only CSV files are supported"));
        }

        tokio::fs::create_dir_all(dir).await.map_err(io_error)?;
        let path = dir.join(format!("upload_{}.csv", Uuid::new_v4()));
        let mut out = tokio::fs::File::create(&path).await.map_err(io_error)?;

        let mut bytes: u64 = 0;
        while let Some(chunk) = field.chunk().await.map_err(bad_request)? {
            bytes += chunk.len() as u64;
            out.write_all(&chunk).await.map_err(io_error)?;
        }
        out.flush().await.map_err(io_error)?;

        return Ok(Some(SavedUpload { file_name, path, bytes }));
    }
    Ok(None)
}

pub async fn upload_dataset(
    State(state): State<SharedState>,
    mut mp: Multipart,
) -> Result<Json<DatasetSummary>, ApiError> {
    let upload = save_upload(&mut mp, Path::new(&state.cfg.upload_dir))
        .await?
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "No file uploaded"))?;

    let result = ingest_saved(&state, &upload).await;

    if let Err(e) = tokio::fs::remove_file(&upload.path).await {
        warn!(path = %upload.path.display(), "failed to remove upload: {e}");
    }
    result.map(Json)
}

async fn ingest_saved(
    state: &SharedState,
    upload: &SavedUpload,
) -> Result<DatasetSummary, ApiError> {
    if upload.bytes == 0 {
        return Err(api_error(StatusCode::BAD_REQUEST, "No file uploaded"));
    }
    info!(file_name = %upload.file_name, bytes = upload.bytes, "upload: processing file");

    let store = state.store.clone();
    let opts = state.cfg.ingest.clone();
    let file_name = upload.file_name.clone();
    let path = upload.path.clone();
    let handle = tokio::runtime::Handle::current();

    let _guard = state.ingest_lock.lock().await;

    // spawn_blocking because the csv reader does blocking file IO
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&path)
            .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        let reader = std::io::BufReader::new(file);
        handle
            .block_on(ingest_csv(reader, &file_name, store.as_ref(), &opts))
            .map_err(dataset_error)
    })
    .await
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
}

pub async fn validate_ranges(
    State(state): State<SharedState>,
    Json(config): Json<DateRangeConfig>,
) -> Json<ValidationResult> {
    let result = validate_date_ranges(&config, state.store.as_ref(), &state.cfg.validator).await;
    info!(valid = result.is_valid, message = %result.message, "validate: done");
    Json(result)
}
