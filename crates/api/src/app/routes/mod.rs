use axum::{
    routing::{get, post},
    Router,
};

pub mod data;
pub mod forecasts;
pub mod jobs;
pub mod system;

/// Router for every endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .route("/jobs", get(jobs::list_runs))
        .route("/jobs/run", post(jobs::run_job))
        .route("/forecasts/latest", get(forecasts::latest_forecasts))
        .route("/forecasts/:version", get(forecasts::forecasts_at_version))
        .route("/model-registry", get(forecasts::latest_registry))
        .route("/data/upload", post(data::upload))
}
