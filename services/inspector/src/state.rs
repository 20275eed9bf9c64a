use std::sync::Arc;

use recordstore::RecordStore;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::ml_client::MlService;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub ml: Arc<dyn MlService>,
    pub cfg: AppConfig,
    /// Held for the whole of an ingestion; uploads clear the store first.
    pub ingest_lock: Mutex<()>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, ml: Arc<dyn MlService>, cfg: AppConfig) -> Self {
        Self {
            store,
            ml,
            cfg,
            ingest_lock: Mutex::new(()),
        }
    }
}
