//! Category time series and forecast points.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::period::{Frequency, Period};

/// One observation on a category's time axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub period: Period,
    pub value: f64,
}

/// Ordered net-consumption history of one dish category.
///
/// Invariant: points are strictly increasing by period and share a single
/// frequency. Observations landing on the same period are summed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTimeSeries {
    category: String,
    points: Vec<SeriesPoint>,
}

impl CategoryTimeSeries {
    /// Build a series from unordered observations.
    pub fn from_observations(
        category: impl Into<String>,
        observations: impl IntoIterator<Item = (Period, f64)>,
    ) -> DomainResult<Self> {
        let mut buckets: BTreeMap<Period, f64> = BTreeMap::new();
        let mut frequency: Option<Frequency> = None;

        for (period, value) in observations {
            match frequency {
                None => frequency = Some(period.frequency()),
                Some(f) if f != period.frequency() => {
                    return Err(DomainError::invariant(
                        "a time series cannot mix weekly and monthly periods",
                    ));
                }
                Some(_) => {}
            }
            *buckets.entry(period).or_insert(0.0) += value;
        }

        Ok(Self {
            category: category.into(),
            points: buckets
                .into_iter()
                .map(|(period, value)| SeriesPoint { period, value })
                .collect(),
        })
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn frequency(&self) -> Option<Frequency> {
        self.points.first().map(|p| p.period.frequency())
    }

    pub fn last_period(&self) -> Option<Period> {
        self.points.last().map(|p| p.period)
    }
}

/// A single predicted value for a future period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    pub category: String,
    pub timestamp: Period,
    pub yhat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yhat_lower: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yhat_upper: Option<f64>,
}

impl ForecastPoint {
    pub fn new(category: impl Into<String>, timestamp: Period, yhat: f64) -> Self {
        Self {
            category: category.into(),
            timestamp,
            yhat,
            yhat_lower: None,
            yhat_upper: None,
        }
    }

    /// Attach confidence bounds. Bounds are widened to contain `yhat` so the
    /// ordering invariant always holds.
    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.yhat_lower = Some(lower.min(self.yhat));
        self.yhat_upper = Some(upper.max(self.yhat));
        self
    }

    pub fn bounds_are_ordered(&self) -> bool {
        match (self.yhat_lower, self.yhat_upper) {
            (Some(lo), Some(hi)) => lo <= self.yhat && self.yhat <= hi,
            (Some(lo), None) => lo <= self.yhat,
            (None, Some(hi)) => self.yhat <= hi,
            (None, None) => true,
        }
    }
}
