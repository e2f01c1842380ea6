use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Why a single category could not be forecast.
///
/// These are per-category and non-fatal: the orchestrator turns them into
/// failed [`ModelDescriptor`]s and carries on with the other categories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForecastError {
    /// Fewer than two distinct periods to fit on.
    #[error("insufficient data")]
    InsufficientData,

    /// Numerical failure while fitting (non-finite values, degenerate design).
    #[error("fit failed: {0}")]
    Fit(String),

    #[error("invalid forecast input: {0}")]
    InvalidInput(String),
}

impl ForecastError {
    pub fn fit(msg: impl Into<String>) -> Self {
        Self::Fit(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStatus {
    Success,
    Failed,
}

/// Registry entry: which model was fit to which category in a run, and how it
/// went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub category: String,
    #[serde(rename = "model")]
    pub model_kind: String,
    pub params: JsonValue,
    pub fitted_at: DateTime<Utc>,
    pub status: FitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModelDescriptor {
    pub fn success(
        category: impl Into<String>,
        model_kind: impl Into<String>,
        params: JsonValue,
        fitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            category: category.into(),
            model_kind: model_kind.into(),
            params,
            fitted_at,
            status: FitStatus::Success,
            error: None,
        }
    }

    pub fn failed(
        category: impl Into<String>,
        model_kind: impl Into<String>,
        params: JsonValue,
        fitted_at: DateTime<Utc>,
        error: &ForecastError,
    ) -> Self {
        Self {
            category: category.into(),
            model_kind: model_kind.into(),
            params,
            fitted_at,
            status: FitStatus::Failed,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FitStatus::Success
    }

    /// Short status used in run summaries: `success` or `failed: <error>`.
    pub fn status_line(&self) -> String {
        match (&self.status, &self.error) {
            (FitStatus::Success, _) => "success".to_string(),
            (FitStatus::Failed, Some(e)) => format!("failed: {e}"),
            (FitStatus::Failed, None) => "failed".to_string(),
        }
    }
}
