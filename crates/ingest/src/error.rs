use thiserror::Error;

use crate::dataset::DatasetRole;

/// Fatal ingestion failures. Any of these aborts the job run.
///
/// Row-level problems are not errors: they are collected as
/// [`crate::IngestWarning`]s and ingestion continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("{role} dataset is missing required column(s): {}", missing.join(", "))]
    Schema {
        role: DatasetRole,
        missing: Vec<&'static str>,
    },

    #[error("{0} dataset is missing")]
    MissingDataset(DatasetRole),

    #[error("{role} dataset is not valid CSV: {detail}")]
    Csv { role: DatasetRole, detail: String },
}
