use serde_json::{json, Value as JsonValue};

use kitchencast_core::{CategoryTimeSeries, ForecastPoint};

use crate::forecaster::{check_series, future_periods, CategoryForecaster, ForecastConfig};
use crate::result::ForecastError;
use crate::stats::{mean, round2, stddev_sample};

/// Naive moving-average baseline.
///
/// Model:
/// - `yhat` is the mean of the last `window` observations (fewer if the series
///   is shorter), repeated over the horizon.
/// - Bounds are `yhat ± z * s`, where `s` is the sample standard deviation of
///   the same window. The lower bound is floored at zero.
#[derive(Debug, Clone)]
pub struct MovingAverageForecaster {
    /// Trailing observations averaged (must be >= 1).
    window: usize,
    /// Width of the band in standard deviations (e.g. 1.96).
    z: f64,
}

impl Default for MovingAverageForecaster {
    fn default() -> Self {
        Self { window: 4, z: 1.96 }
    }
}

impl MovingAverageForecaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_z(mut self, z: f64) -> Self {
        self.z = z;
        self
    }
}

impl CategoryForecaster for MovingAverageForecaster {
    fn model_kind(&self) -> String {
        format!("Naive-MA({})", self.window)
    }

    fn params(&self, config: &ForecastConfig) -> JsonValue {
        json!({
            "window": self.window,
            "z": self.z,
            "frequency": config.frequency(),
            "horizon": config.horizon(),
        })
    }

    fn forecast(
        &self,
        series: &CategoryTimeSeries,
        config: &ForecastConfig,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        if self.window == 0 {
            return Err(ForecastError::invalid_input("window must be >= 1"));
        }
        if !(self.z.is_finite() && self.z > 0.0) {
            return Err(ForecastError::invalid_input("z must be a finite positive number"));
        }
        let last = check_series(series, config)?;

        let values = series.values();
        let tail = &values[values.len().saturating_sub(self.window)..];
        let m = mean(tail);
        let s = stddev_sample(tail, m);
        if !(m.is_finite() && s.is_finite()) {
            return Err(ForecastError::fit(format!(
                "moving average is not finite (mean={m}, std={s})"
            )));
        }

        let yhat = round2(m);
        let half_width = self.z * s;
        let lower = round2((yhat - half_width).max(0.0));
        let upper = round2(yhat + half_width);

        Ok(future_periods(last, config.horizon())
            .map(|period| {
                ForecastPoint::new(series.category(), period, yhat).with_bounds(lower, upper)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kitchencast_core::{Frequency, MonthKey, Period};

    fn weekly_series(category: &str, values: &[f64]) -> CategoryTimeSeries {
        let start = Period::weekly(MonthKey::new(2024, 1).unwrap(), 1).unwrap();
        CategoryTimeSeries::from_observations(
            category,
            values.iter().enumerate().map(|(i, v)| (start.offset(i as i64), *v)),
        )
        .unwrap()
    }

    fn weekly(horizon: u32) -> ForecastConfig {
        ForecastConfig::new(horizon, Frequency::Weekly).unwrap()
    }

    #[test]
    fn averages_the_trailing_window() {
        let series = weekly_series("Primi", &[100.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let points = MovingAverageForecaster::default().forecast(&series, &weekly(3)).unwrap();

        assert_eq!(points.len(), 3);
        assert!(points.iter().all(|p| p.yhat == 3.5));
        assert!(points.iter().all(|p| p.bounds_are_ordered()));
    }

    #[test]
    fn horizon_extends_the_axis_strictly() {
        let series = weekly_series("Primi", &[1.0, 2.0, 3.0]);
        let last = series.last_period().unwrap();
        let points = MovingAverageForecaster::default().forecast(&series, &weekly(8)).unwrap();

        for (h, p) in points.iter().enumerate() {
            assert_eq!(p.timestamp, last.offset(h as i64 + 1));
            assert_eq!(p.category, "Primi");
        }
    }

    #[test]
    fn constant_series_has_zero_width_band() {
        let series = weekly_series("Dolci", &[7.0, 7.0, 7.0, 7.0]);
        let points = MovingAverageForecaster::default().forecast(&series, &weekly(2)).unwrap();
        assert_eq!(points[0].yhat_lower, Some(7.0));
        assert_eq!(points[0].yhat_upper, Some(7.0));
    }

    #[test]
    fn lower_bound_is_floored_at_zero() {
        let series = weekly_series("Contorni", &[0.0, 50.0, 0.0, 50.0]);
        let points = MovingAverageForecaster::default().forecast(&series, &weekly(1)).unwrap();
        assert_eq!(points[0].yhat_lower, Some(0.0));
        assert!(points[0].yhat_upper.unwrap() > points[0].yhat);
    }

    #[test]
    fn single_point_is_insufficient() {
        let series = weekly_series("Primi", &[42.0]);
        let err = MovingAverageForecaster::default().forecast(&series, &weekly(4)).unwrap_err();
        assert_eq!(err, ForecastError::InsufficientData);
    }

    #[test]
    fn frequency_mismatch_is_rejected() {
        let series = weekly_series("Primi", &[1.0, 2.0]);
        let monthly = ForecastConfig::new(2, Frequency::Monthly).unwrap();
        assert!(matches!(
            MovingAverageForecaster::default().forecast(&series, &monthly),
            Err(ForecastError::InvalidInput(_))
        ));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let series = weekly_series("Primi", &[1.0, 2.0]);
        assert!(MovingAverageForecaster::new().with_window(0).forecast(&series, &weekly(1)).is_err());
        assert!(MovingAverageForecaster::new().with_z(f64::NAN).forecast(&series, &weekly(1)).is_err());
    }

    #[test]
    fn identical_inputs_give_identical_outputs() {
        let series = weekly_series("Secondi", &[3.3, 4.1, 9.7, 2.2, 5.5]);
        let model = MovingAverageForecaster::default();
        assert_eq!(
            model.forecast(&series, &weekly(5)).unwrap(),
            model.forecast(&series, &weekly(5)).unwrap()
        );
    }

    proptest::proptest! {
        #[test]
        fn output_is_non_negative_and_ordered(
            values in proptest::collection::vec(0.0f64..500.0, 2..40),
            horizon in 1u32..20,
        ) {
            let series = weekly_series("Dolci", &values);
            let points = MovingAverageForecaster::default()
                .forecast(&series, &weekly(horizon))
                .unwrap();

            proptest::prop_assert_eq!(points.len(), horizon as usize);
            for p in &points {
                proptest::prop_assert!(p.yhat >= 0.0);
                proptest::prop_assert!(p.bounds_are_ordered());
                proptest::prop_assert!(p.yhat_lower.unwrap_or(0.0) >= 0.0);
            }
        }
    }
}
