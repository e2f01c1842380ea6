use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::{debug, warn};

use kitchencast_core::{CategoryTimeSeries, ForecastPoint};

use crate::forecaster::{CategoryForecaster, ForecastConfig};
use crate::result::ForecastError;

/// Result of fitting one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryOutcome {
    pub category: String,
    pub result: Result<Vec<ForecastPoint>, ForecastError>,
}

impl CategoryOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Fans category fits out over a dedicated worker pool.
///
/// - Categories are independent: a failure or panic in one never affects
///   another.
/// - Output is sorted by category name regardless of completion order.
/// - Every successful result is checked against the forecaster contract
///   before it is reported; violations become [`ForecastError::Fit`].
pub struct ForecastScheduler {
    pool: ThreadPool,
}

impl std::fmt::Debug for ForecastScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastScheduler")
            .field("workers", &self.workers())
            .finish()
    }
}

impl ForecastScheduler {
    /// `workers == 0` sizes the pool to the available parallelism.
    pub fn new(workers: usize) -> Result<Self, ThreadPoolBuildError> {
        let workers = if workers == 0 {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        } else {
            workers
        };
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("forecast-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn run_all(
        &self,
        forecaster: &dyn CategoryForecaster,
        series: &[CategoryTimeSeries],
        config: &ForecastConfig,
    ) -> Vec<CategoryOutcome> {
        let mut outcomes: Vec<CategoryOutcome> = self.pool.install(|| {
            series
                .par_iter()
                .map(|s| CategoryOutcome {
                    category: s.category().to_string(),
                    result: fit_one(forecaster, s, config),
                })
                .collect()
        });
        outcomes.sort_by(|a, b| a.category.cmp(&b.category));
        outcomes
    }
}

fn fit_one(
    forecaster: &dyn CategoryForecaster,
    series: &CategoryTimeSeries,
    config: &ForecastConfig,
) -> Result<Vec<ForecastPoint>, ForecastError> {
    let result = catch_unwind(AssertUnwindSafe(|| forecaster.forecast(series, config)))
        .unwrap_or_else(|payload| {
            let msg = panic_message(payload.as_ref());
            warn!(category = %series.category(), panic = %msg, "forecaster panicked");
            Err(ForecastError::fit(format!("model panicked: {msg}")))
        })
        .and_then(|points| validate_output(series, config, points));

    match &result {
        Ok(points) => debug!(category = %series.category(), points = points.len(), "category fitted"),
        Err(e) => debug!(category = %series.category(), error = %e, "category failed"),
    }
    result
}

fn validate_output(
    series: &CategoryTimeSeries,
    config: &ForecastConfig,
    points: Vec<ForecastPoint>,
) -> Result<Vec<ForecastPoint>, ForecastError> {
    let last = series.last_period().ok_or(ForecastError::InsufficientData)?;
    if points.len() != config.horizon() as usize {
        return Err(ForecastError::fit(format!(
            "expected {} points, model returned {}",
            config.horizon(),
            points.len()
        )));
    }
    for (h, p) in points.iter().enumerate() {
        let expected = last.offset(h as i64 + 1);
        if p.timestamp != expected {
            return Err(ForecastError::fit(format!(
                "point {h} is at {} but should be at {expected}",
                p.timestamp
            )));
        }
        let finite = p.yhat.is_finite()
            && p.yhat_lower.is_none_or(f64::is_finite)
            && p.yhat_upper.is_none_or(f64::is_finite);
        if !finite || !p.bounds_are_ordered() {
            return Err(ForecastError::fit(format!("invalid values at {}", p.timestamp)));
        }
    }
    Ok(points)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MovingAverageForecaster;
    use kitchencast_core::{Frequency, MonthKey, Period};
    use serde_json::{json, Value as JsonValue};

    fn series(category: &str, values: &[f64]) -> CategoryTimeSeries {
        let start = Period::monthly(MonthKey::new(2024, 1).unwrap());
        CategoryTimeSeries::from_observations(
            category,
            values.iter().enumerate().map(|(i, v)| (start.offset(i as i64), *v)),
        )
        .unwrap()
    }

    fn config() -> ForecastConfig {
        ForecastConfig::new(3, Frequency::Monthly).unwrap()
    }

    struct Exploding;

    impl CategoryForecaster for Exploding {
        fn model_kind(&self) -> String {
            "exploding".into()
        }
        fn params(&self, _: &ForecastConfig) -> JsonValue {
            json!({})
        }
        fn forecast(
            &self,
            series: &CategoryTimeSeries,
            config: &ForecastConfig,
        ) -> Result<Vec<ForecastPoint>, ForecastError> {
            if series.category() == "Dolci" {
                panic!("boom");
            }
            MovingAverageForecaster::default().forecast(series, config)
        }
    }

    struct ShortOutput;

    impl CategoryForecaster for ShortOutput {
        fn model_kind(&self) -> String {
            "short".into()
        }
        fn params(&self, _: &ForecastConfig) -> JsonValue {
            json!({})
        }
        fn forecast(
            &self,
            series: &CategoryTimeSeries,
            _: &ForecastConfig,
        ) -> Result<Vec<ForecastPoint>, ForecastError> {
            let last = series.last_period().unwrap();
            Ok(vec![ForecastPoint::new(series.category(), last.next(), 1.0)])
        }
    }

    #[test]
    fn zero_workers_uses_available_parallelism() {
        assert!(ForecastScheduler::new(0).unwrap().workers() >= 1);
        assert_eq!(ForecastScheduler::new(2).unwrap().workers(), 2);
    }

    #[test]
    fn outcomes_are_sorted_and_isolated() {
        let scheduler = ForecastScheduler::new(4).unwrap();
        let input = vec![
            series("Secondi", &[1.0, 2.0, 3.0]),
            series("Antipasti", &[5.0]),
            series("Primi", &[4.0, 4.0]),
        ];
        let outcomes = scheduler.run_all(&MovingAverageForecaster::default(), &input, &config());

        let names: Vec<_> = outcomes.iter().map(|o| o.category.as_str()).collect();
        assert_eq!(names, vec!["Antipasti", "Primi", "Secondi"]);
        assert_eq!(outcomes[0].result, Err(ForecastError::InsufficientData));
        assert!(outcomes[1].is_success());
        assert!(outcomes[2].is_success());
    }

    #[test]
    fn a_panicking_category_becomes_a_fit_error() {
        let scheduler = ForecastScheduler::new(2).unwrap();
        let input = vec![series("Dolci", &[1.0, 2.0]), series("Primi", &[1.0, 2.0])];
        let outcomes = scheduler.run_all(&Exploding, &input, &config());

        assert!(matches!(&outcomes[0].result, Err(ForecastError::Fit(m)) if m.contains("boom")));
        assert!(outcomes[1].is_success());
    }

    #[test]
    fn contract_violations_are_caught() {
        let scheduler = ForecastScheduler::new(1).unwrap();
        let outcomes = scheduler.run_all(&ShortOutput, &[series("Primi", &[1.0, 2.0])], &config());
        assert!(matches!(outcomes[0].result, Err(ForecastError::Fit(_))));
    }

    #[test]
    fn parallel_and_serial_runs_agree() {
        let input: Vec<_> = (0..16)
            .map(|i| series(&format!("cat-{i:02}"), &[i as f64, 2.0 * i as f64, 3.0]))
            .collect();
        let model = MovingAverageForecaster::default();
        let serial = ForecastScheduler::new(1).unwrap().run_all(&model, &input, &config());
        let parallel = ForecastScheduler::new(8).unwrap().run_all(&model, &input, &config());
        assert_eq!(serial, parallel);
    }
}
