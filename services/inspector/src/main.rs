mod config;
mod ml_client;
mod pg_store;
mod routes_dataset;
mod routes_model;
mod routes_simulation;
mod state;
mod types_ml;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use recordstore::{InMemoryRecordStore, RecordStore};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::ml_client::{HttpMlService, MlService};
use crate::pg_store::PgRecordStore;
use crate::state::{AppState, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env()?;

    let store = build_store(&cfg).await?;
    let ml: Arc<dyn MlService> = Arc::new(HttpMlService::new(cfg.ml_service_url.clone()));

    // The model service may come up later; do not block startup on it.
    match ml.ping().await {
        Ok(()) => info!(url = %cfg.ml_service_url, "ml-service: ok"),
        Err(e) => warn!(url = %cfg.ml_service_url, "ml-service: unreachable at startup: {e}"),
    }

    let app_state = Arc::new(AppState::new(store, ml, cfg.clone()));
    let app = router(app_state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.bind_addr))?;
    info!("inspector listening on http://{}", cfg.bind_addr);
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

async fn build_store(cfg: &AppConfig) -> Result<Arc<dyn RecordStore>> {
    let Some(url) = &cfg.database_url else {
        warn!("DATABASE_URL not set; records are kept in memory");
        return Ok(Arc::new(InMemoryRecordStore::new()));
    };

    let pg_pool = PgPool::connect(url)
        .await
        .context("Failed to connect to Postgres")?;

    sqlx::migrate!("./migrations")
        .run(&pg_pool)
        .await
        .context("Failed to run migrations")?;

    check_postgres(&pg_pool).await?;
    info!("postgres: ok");

    Ok(Arc::new(PgRecordStore::new(pg_pool)))
}

async fn check_postgres(pg_pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pg_pool)
        .await
        .context("Postgres ping failed")?;
    Ok(())
}

fn router(state: SharedState) -> Router {
    let upload_limit = state.cfg.max_upload_bytes;

    Router::new()
        .route(
            "/api/dataset/upload",
            post(routes_dataset::upload_dataset).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/dataset/validate-ranges", post(routes_dataset::validate_ranges))
        .route("/api/model/train", post(routes_model::train_model))
        .route("/api/simulation/start", post(routes_simulation::start_simulation))
        .route("/api/simulation/stats", get(routes_simulation::simulation_stats))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "mlService": state.ml.info(),
    }))
}
