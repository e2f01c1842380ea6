//! Forecast job runs.
//!
//! ## Design
//!
//! - One run at a time: a second submission fails fast with `Conflict`
//! - Categories are fit in parallel and fail independently
//! - A run publishes exactly one snapshot, or nothing
//! - A bounded history of completed runs is kept for inspection
//!
//! ## Components
//!
//! - `JobOrchestrator`: drives the pipeline and owns the running flag
//! - `RunRequest` / `RunReport`: the run API
//! - `JobRun`: audit record of a completed run

pub mod orchestrator;
pub mod types;

pub use orchestrator::{JobError, JobOrchestrator, OrchestratorConfig};
pub use types::{JobRun, OrchestratorState, RunOutcome, RunReport, RunRequest};
