//! Infrastructure layer: artifact storage, dataset files, model registry and
//! the job orchestrator that ties the pipeline together.

pub mod artifacts;
pub mod datasets;
pub mod jobs;
pub mod registry;

pub use artifacts::{
    ArtifactSnapshot, ArtifactStore, FsArtifactStore, InMemoryArtifactStore, StoreError, Versioned,
};
pub use datasets::{DatasetSource, DirectoryDatasetSource, InMemoryDatasetSource};
pub use jobs::{
    JobError, JobOrchestrator, JobRun, OrchestratorConfig, OrchestratorState, RunOutcome,
    RunReport, RunRequest,
};
pub use registry::ModelRegistry;

#[cfg(test)]
mod integration_tests;
