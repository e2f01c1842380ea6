use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::error;

use crate::app::dto::{JobsResponse, RunJobRequest};
use crate::app::errors;
use crate::app::services::AppServices;

/// `POST /jobs/run`. An empty body runs with the configured defaults.
pub async fn run_job(
    Extension(services): Extension<Arc<AppServices>>,
    body: Bytes,
) -> axum::response::Response {
    let body: RunJobRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RunJobRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(b) => b,
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.to_string());
            }
        }
    };
    let request = match body.into_run_request() {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let orchestrator = services.orchestrator.clone();
    match tokio::task::spawn_blocking(move || orchestrator.run(request)).await {
        Ok(Ok(report)) => (StatusCode::OK, Json(report)).into_response(),
        Ok(Err(e)) => errors::job_error_to_response(e),
        Err(join_err) => {
            error!(error = %join_err, "job run task failed");
            errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "job run task failed",
            )
        }
    }
}

/// `GET /jobs`: current state and recent runs, newest first.
pub async fn list_runs(Extension(services): Extension<Arc<AppServices>>) -> Json<JobsResponse> {
    Json(JobsResponse {
        state: services.orchestrator.state(),
        runs: services.orchestrator.recent_runs(),
    })
}
