//! Job run types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kitchencast_core::{Frequency, RunId};

/// Whether a run is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    Idle,
    Running,
}

/// How a completed run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every category produced a forecast; a snapshot was published.
    Succeeded,
    /// At least one category failed and at least one succeeded; a snapshot
    /// was published.
    PartiallyFailed,
    /// Nothing was published.
    Failed,
}

impl RunOutcome {
    pub fn published(&self) -> bool {
        !matches!(self, RunOutcome::Failed)
    }
}

/// Parameters of a run. Missing fields fall back to the service defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub horizon: Option<u32>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
}

impl RunRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_horizon(mut self, horizon: u32) -> Self {
        self.horizon = Some(horizon);
        self
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }
}

/// What a successful run returns to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: RunId,
    pub version: u64,
    pub horizon: u32,
    pub frequency: Frequency,
    pub generated_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    /// `category -> "success" | "failed: <error>"`.
    pub summary: BTreeMap<String, String>,
    /// Row-level ingestion warnings (coerced values, rejected rows).
    pub warnings: usize,
}

/// Audit record of one run. Immutable once completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRun {
    pub id: RunId,
    /// Version the run targeted. Only published when `outcome` is not
    /// `Failed`.
    pub version: u64,
    pub horizon: u32,
    pub frequency: Frequency,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub summary: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobRun {
    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }
}
