//! `kitchencast-forecast`
//!
//! **Responsibility:** per-category demand models and their parallel fan-out.
//!
//! This crate is intentionally storage-agnostic:
//! - Models are pure functions of a series and a config (no randomness).
//! - A failing category yields a [`ForecastError`], never a panic or a side
//!   effect on sibling categories.
//! - Results are reported as [`ModelDescriptor`]s; persisting them is the
//!   caller's job.

pub mod forecaster;
pub mod linear_trend;
pub mod moving_average;
pub mod result;
pub mod scheduler;
mod stats;

pub use forecaster::{CategoryForecaster, ForecastConfig, ModelChoice, MAX_HORIZON};
pub use linear_trend::LinearTrendForecaster;
pub use moving_average::MovingAverageForecaster;
pub use result::{FitStatus, ForecastError, ModelDescriptor};
pub use scheduler::{CategoryOutcome, ForecastScheduler};
