//! Service wiring: dataset directory, artifact store, forecast pool and the
//! job orchestrator, built once from [`ServiceConfig`].

use std::sync::Arc;

use tracing::info;

use kitchencast_forecast::ForecastScheduler;
use kitchencast_infra::datasets::DatasetError;
use kitchencast_infra::{
    ArtifactStore, DatasetSource, DirectoryDatasetSource, FsArtifactStore, JobOrchestrator,
    OrchestratorConfig, StoreError,
};

use crate::config::ServiceConfig;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("artifact store: {0}")]
    Store(#[from] StoreError),
    #[error("data directory: {0}")]
    Datasets(#[from] DatasetError),
    #[error("forecast worker pool: {0}")]
    Workers(String),
}

/// Everything request handlers need.
pub struct AppServices {
    pub app_version: String,
    pub upload_enabled: bool,
    pub datasets: Arc<dyn DatasetSource>,
    pub store: Arc<dyn ArtifactStore>,
    pub orchestrator: Arc<JobOrchestrator>,
}

impl AppServices {
    pub fn new(
        config: &ServiceConfig,
        datasets: Arc<dyn DatasetSource>,
        store: Arc<dyn ArtifactStore>,
        scheduler: ForecastScheduler,
    ) -> Self {
        let orchestrator = JobOrchestrator::new(
            OrchestratorConfig::default()
                .with_defaults(config.horizon, config.frequency)
                .with_model(config.model),
            datasets.clone(),
            store.clone(),
            scheduler,
        );
        Self {
            app_version: config.app_version.clone(),
            upload_enabled: config.enable_direct_upload,
            datasets,
            store,
            orchestrator: Arc::new(orchestrator),
        }
    }
}

/// Open the on-disk dataset directory and artifact store named by `config`.
pub fn build_services(config: &ServiceConfig) -> Result<AppServices, StartupError> {
    let datasets = Arc::new(DirectoryDatasetSource::new(&config.data_dir)?);
    let store = Arc::new(FsArtifactStore::open(&config.artifacts_dir, config.artifact_retention)?);
    let scheduler =
        ForecastScheduler::new(config.workers).map_err(|e| StartupError::Workers(e.to_string()))?;

    info!(
        data_dir = %config.data_dir.display(),
        artifacts_dir = %config.artifacts_dir.display(),
        latest_version = ?store.latest_version(),
        workers = scheduler.workers(),
        model = ?config.model,
        upload_enabled = config.enable_direct_upload,
        "services initialised"
    );

    Ok(AppServices::new(config, datasets, store, scheduler))
}
