//! `kitchencast-core`: shared building blocks for the forecast pipeline.
//!
//! This crate contains **pure** value types (no IO, no threads): the period
//! axis, category time series, forecast points and the domain error model.

pub mod error;
pub mod id;
pub mod period;
pub mod series;

pub use error::{DomainError, DomainResult};
pub use id::RunId;
pub use period::{parse_week, Frequency, MonthKey, Period, WEEKS_PER_MONTH};
pub use series::{CategoryTimeSeries, ForecastPoint, SeriesPoint};
