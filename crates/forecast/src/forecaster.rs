use core::str::FromStr;

use serde_json::Value as JsonValue;

use kitchencast_core::{
    CategoryTimeSeries, DomainError, DomainResult, ForecastPoint, Frequency, Period,
};

use crate::linear_trend::LinearTrendForecaster;
use crate::moving_average::MovingAverageForecaster;
use crate::result::ForecastError;

/// Longest accepted horizon (two years of weekly periods).
pub const MAX_HORIZON: u32 = 104;

/// Horizon and frequency shared by every category of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastConfig {
    horizon: u32,
    frequency: Frequency,
}

impl ForecastConfig {
    pub fn new(horizon: u32, frequency: Frequency) -> DomainResult<Self> {
        if horizon == 0 || horizon > MAX_HORIZON {
            return Err(DomainError::validation(format!(
                "horizon must be within 1..={MAX_HORIZON}; got {horizon}"
            )));
        }
        Ok(Self { horizon, frequency })
    }

    pub fn horizon(&self) -> u32 {
        self.horizon
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }
}

/// A demand model fit independently to one category.
///
/// Contract:
/// - on success, returns exactly `config.horizon()` points whose periods
///   continue the series' axis (`last + 1 ..= last + horizon`);
/// - fails with [`ForecastError::InsufficientData`] below two distinct periods;
/// - identical inputs produce bit-identical outputs;
/// - bounds, when present, bracket `yhat`.
///
/// Must not touch shared state; the scheduler runs many categories at once.
pub trait CategoryForecaster: Send + Sync + 'static {
    /// Registry name of the model, e.g. `Naive-MA(4)`.
    fn model_kind(&self) -> String;

    /// Parameters recorded in the registry for this run.
    fn params(&self, config: &ForecastConfig) -> JsonValue;

    fn forecast(
        &self,
        series: &CategoryTimeSeries,
        config: &ForecastConfig,
    ) -> Result<Vec<ForecastPoint>, ForecastError>;
}

/// Common precondition checks. Returns the last observed period.
pub(crate) fn check_series(
    series: &CategoryTimeSeries,
    config: &ForecastConfig,
) -> Result<Period, ForecastError> {
    let last = match series.last_period() {
        Some(p) if series.len() >= 2 => p,
        _ => return Err(ForecastError::InsufficientData),
    };
    if last.frequency() != config.frequency() {
        return Err(ForecastError::invalid_input(format!(
            "series is {} but the run is {}",
            last.frequency(),
            config.frequency()
        )));
    }
    if series.points().iter().any(|p| !p.value.is_finite()) {
        return Err(ForecastError::fit("series contains non-finite values"));
    }
    Ok(last)
}

pub(crate) fn future_periods(last: Period, horizon: u32) -> impl Iterator<Item = Period> {
    (1..=i64::from(horizon)).map(move |h| last.offset(h))
}

/// Model selection, as configured for the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelChoice {
    #[default]
    MovingAverage,
    LinearTrend,
}

impl ModelChoice {
    pub fn build(&self) -> Box<dyn CategoryForecaster> {
        match self {
            ModelChoice::MovingAverage => Box::new(MovingAverageForecaster::default()),
            ModelChoice::LinearTrend => Box::new(LinearTrendForecaster::default()),
        }
    }
}

impl FromStr for ModelChoice {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "moving_average" | "naive" => Ok(ModelChoice::MovingAverage),
            "linear_trend" | "ols" => Ok(ModelChoice::LinearTrend),
            other => Err(DomainError::validation(format!(
                "unknown forecast model '{other}' (expected moving_average or linear_trend)"
            ))),
        }
    }
}
