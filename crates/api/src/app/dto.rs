use serde::{Deserialize, Serialize};

use kitchencast_core::Frequency;
use kitchencast_infra::{JobRun, OrchestratorState, RunRequest};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /jobs/run`. Both fields fall back to the service defaults.
#[derive(Debug, Default, Deserialize)]
pub struct RunJobRequest {
    pub horizon: Option<u32>,
    /// `Weekly` / `Monthly`, or `W` / `M` (case-insensitive).
    pub frequency: Option<String>,
}

impl RunJobRequest {
    pub fn into_run_request(self) -> Result<RunRequest, axum::response::Response> {
        let frequency = match self.frequency.as_deref() {
            Some(raw) => Some(raw.parse::<Frequency>().map_err(|e| {
                errors::json_error(
                    axum::http::StatusCode::BAD_REQUEST,
                    "validation_error",
                    e.to_string(),
                )
            })?),
            None => None,
        };
        Ok(RunRequest {
            horizon: self.horizon,
            frequency,
        })
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub state: OrchestratorState,
    pub runs: Vec<JobRun>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub replaced: Vec<&'static str>,
}
