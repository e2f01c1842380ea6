//! `kitchencast-ingest`
//!
//! **Responsibility:** turn the three raw input datasets (sales, tray waste,
//! plate waste) into cleansed consumption records, and group those records
//! into one ordered time series per dish category.
//!
//! Everything here is deterministic and side-effect free apart from logging:
//! no file system access, no shared state.

pub mod dataset;
pub mod error;
pub mod ingestor;
pub mod segmenter;

pub use dataset::{Column, DatasetRole, InputBundle, RawDataset, REQUIRED_COLUMNS};
pub use error::IngestError;
pub use ingestor::{ingest, ConsumptionKey, ConsumptionRecord, IngestReport, IngestWarning};
pub use segmenter::segment;
