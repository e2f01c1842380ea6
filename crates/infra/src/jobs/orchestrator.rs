//! The forecast job pipeline: datasets -> ingest -> segment -> parallel
//! per-category fits -> registry -> published snapshot.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use kitchencast_core::{DomainError, Frequency, RunId};
use kitchencast_forecast::{
    CategoryForecaster, ForecastConfig, ForecastScheduler, ModelChoice,
};
use kitchencast_ingest::{ingest, segment, IngestError};

use super::types::{JobRun, OrchestratorState, RunOutcome, RunReport, RunRequest};
use crate::artifacts::{ArtifactSnapshot, ArtifactStore, StoreError};
use crate::datasets::DatasetSource;
use crate::registry::{collect_points, ModelRegistry};

/// Why a run did not publish.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// Another run is in flight. Nothing is queued.
    #[error("a forecast job is already running")]
    Conflict,

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("invalid run request: {0}")]
    InvalidRequest(String),

    /// No category produced a forecast (including the zero-category case).
    #[error("all {} categories failed to forecast", summary.len())]
    AllCategoriesFailed { summary: BTreeMap<String, String> },

    #[error("publishing artifacts failed: {0}")]
    Publish(#[from] StoreError),
}

impl From<DomainError> for JobError {
    fn from(e: DomainError) -> Self {
        JobError::InvalidRequest(e.to_string())
    }
}

/// Service-level defaults for runs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub default_horizon: u32,
    pub default_frequency: Frequency,
    pub model: ModelChoice,
    /// Completed runs kept for `recent_runs()`.
    pub history_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_horizon: 8,
            default_frequency: Frequency::Weekly,
            model: ModelChoice::default(),
            history_limit: 20,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_defaults(mut self, horizon: u32, frequency: Frequency) -> Self {
        self.default_horizon = horizon;
        self.default_frequency = frequency;
        self
    }

    pub fn with_model(mut self, model: ModelChoice) -> Self {
        self.model = model;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }
}

/// Clears the running flag on every exit path, unwinding included.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single-flight runner of the forecast pipeline.
///
/// Blocking: `run` does file IO and CPU-bound fitting on the caller's thread
/// (fits fan out onto the scheduler's pool). Async callers should wrap it in
/// a blocking task.
pub struct JobOrchestrator {
    config: OrchestratorConfig,
    source: Arc<dyn DatasetSource>,
    store: Arc<dyn ArtifactStore>,
    scheduler: ForecastScheduler,
    forecaster: Box<dyn CategoryForecaster>,
    running: AtomicBool,
    history: Mutex<VecDeque<JobRun>>,
}

impl std::fmt::Debug for JobOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobOrchestrator")
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .field("model", &self.forecaster.model_kind())
            .field("state", &self.state())
            .finish()
    }
}

impl JobOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        source: Arc<dyn DatasetSource>,
        store: Arc<dyn ArtifactStore>,
        scheduler: ForecastScheduler,
    ) -> Self {
        let forecaster = config.model.build();
        Self {
            config,
            source,
            store,
            scheduler,
            forecaster,
            running: AtomicBool::new(false),
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Replace the configured model.
    pub fn with_forecaster(mut self, forecaster: Box<dyn CategoryForecaster>) -> Self {
        self.forecaster = forecaster;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    pub fn state(&self) -> OrchestratorState {
        if self.running.load(Ordering::Acquire) {
            OrchestratorState::Running
        } else {
            OrchestratorState::Idle
        }
    }

    /// Completed runs, newest first.
    pub fn recent_runs(&self) -> Vec<JobRun> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn resolve(&self, request: RunRequest) -> Result<ForecastConfig, JobError> {
        let horizon = request.horizon.unwrap_or(self.config.default_horizon);
        let frequency = request.frequency.unwrap_or(self.config.default_frequency);
        Ok(ForecastConfig::new(horizon, frequency)?)
    }

    /// Run the pipeline once. Fails fast with [`JobError::Conflict`] if a run
    /// is already in flight.
    pub fn run(&self, request: RunRequest) -> Result<RunReport, JobError> {
        let config = self.resolve(request)?;
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            warn!("job run rejected: another run is in progress");
            return Err(JobError::Conflict);
        };

        let run_id = RunId::new();
        let started_at = Utc::now();
        let version = self.store.latest_version().unwrap_or(0) + 1;
        info!(
            run_id = %run_id,
            version,
            horizon = config.horizon(),
            frequency = %config.frequency(),
            model = %self.forecaster.model_kind(),
            "job run started"
        );

        let result = self.execute(run_id, version, &config);
        self.record(run_id, version, &config, started_at, &result);
        result
    }

    fn execute(
        &self,
        run_id: RunId,
        version: u64,
        config: &ForecastConfig,
    ) -> Result<RunReport, JobError> {
        let bundle = self.source.load()?;
        let report = ingest(&bundle)?;
        let series = segment(&report.records, config.frequency())?;
        info!(
            run_id = %run_id,
            records = report.records.len(),
            warnings = report.warnings.len(),
            rejected_rows = report.rejected_rows,
            categories = series.len(),
            "datasets ingested"
        );

        let outcomes = self
            .scheduler
            .run_all(self.forecaster.as_ref(), &series, config);
        let generated_at = Utc::now();
        let registry =
            ModelRegistry::assemble(self.forecaster.as_ref(), config, &outcomes, generated_at);
        let summary = registry.summary();

        let successes = registry.success_count();
        if successes == 0 {
            return Err(JobError::AllCategoriesFailed { summary });
        }
        let outcome = if successes == registry.len() {
            RunOutcome::Succeeded
        } else {
            RunOutcome::PartiallyFailed
        };

        let snapshot = ArtifactSnapshot::new(
            version,
            generated_at,
            collect_points(&outcomes),
            registry.into_entries(),
        );
        self.store.publish(snapshot)?;

        Ok(RunReport {
            run_id,
            version,
            horizon: config.horizon(),
            frequency: config.frequency(),
            generated_at,
            outcome,
            summary,
            warnings: report.warnings.len(),
        })
    }

    fn record(
        &self,
        run_id: RunId,
        version: u64,
        config: &ForecastConfig,
        started_at: DateTime<Utc>,
        result: &Result<RunReport, JobError>,
    ) {
        let (outcome, summary, error) = match result {
            Ok(report) => (report.outcome, report.summary.clone(), None),
            Err(JobError::AllCategoriesFailed { summary }) => (
                RunOutcome::Failed,
                summary.clone(),
                Some(result_error(result)),
            ),
            Err(_) => (RunOutcome::Failed, BTreeMap::new(), Some(result_error(result))),
        };
        let run = JobRun {
            id: run_id,
            version,
            horizon: config.horizon(),
            frequency: config.frequency(),
            started_at,
            completed_at: Utc::now(),
            outcome,
            summary,
            error,
        };

        match &run.error {
            None => info!(
                run_id = %run.id,
                version = run.version,
                outcome = ?run.outcome,
                categories = run.summary.len(),
                duration_ms = run.duration_ms(),
                "job run completed"
            ),
            Some(e) => error!(
                run_id = %run.id,
                version = run.version,
                error = %e,
                duration_ms = run.duration_ms(),
                "job run failed"
            ),
        }

        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.push_front(run);
        history.truncate(self.config.history_limit);
    }
}

fn result_error(result: &Result<RunReport, JobError>) -> String {
    result.as_ref().err().map(ToString::to_string).unwrap_or_default()
}
