use serde_json::{json, Value as JsonValue};

use kitchencast_core::{CategoryTimeSeries, ForecastPoint};

use crate::forecaster::{check_series, future_periods, CategoryForecaster, ForecastConfig};
use crate::result::ForecastError;
use crate::stats::{mean, round2};

/// Ordinary least-squares trend line over the period axis.
///
/// `x` is the period offset from the first observation, so gaps in the
/// history are respected. Predictions are floored at zero. With three or more
/// points the band is the classic prediction interval
/// `yhat ± z * s * sqrt(1 + 1/n + (x - x̄)² / Sxx)`; with exactly two points
/// the residual variance is undefined and no bounds are produced.
#[derive(Debug, Clone)]
pub struct LinearTrendForecaster {
    z: f64,
}

impl Default for LinearTrendForecaster {
    fn default() -> Self {
        Self { z: 1.96 }
    }
}

impl LinearTrendForecaster {
    pub fn with_z(mut self, z: f64) -> Self {
        self.z = z;
        self
    }
}

struct Fit {
    intercept: f64,
    slope: f64,
    x_mean: f64,
    sxx: f64,
    n: usize,
    residual_std: Option<f64>,
}

fn fit(xs: &[f64], ys: &[f64]) -> Result<Fit, ForecastError> {
    let n = xs.len();
    let x_mean = mean(xs);
    let y_mean = mean(ys);
    let sxx: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();
    if !(sxx.is_finite() && sxx > 0.0) {
        return Err(ForecastError::fit("degenerate design: all periods coincide"));
    }
    let sxy: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - x_mean) * (y - y_mean))
        .sum();
    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let residual_std = if n > 2 {
        let ssr: f64 = xs
            .iter()
            .zip(ys)
            .map(|(x, y)| (y - (intercept + slope * x)).powi(2))
            .sum();
        Some((ssr / (n - 2) as f64).sqrt())
    } else {
        None
    };

    if !(slope.is_finite() && intercept.is_finite() && residual_std.is_none_or(f64::is_finite)) {
        return Err(ForecastError::fit("least-squares solution is not finite"));
    }

    Ok(Fit {
        intercept,
        slope,
        x_mean,
        sxx,
        n,
        residual_std,
    })
}

impl CategoryForecaster for LinearTrendForecaster {
    fn model_kind(&self) -> String {
        "OLS-Trend".to_string()
    }

    fn params(&self, config: &ForecastConfig) -> JsonValue {
        json!({
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
        if !(self.z.is_finite() && self.z > 0.0) {
            return Err(ForecastError::invalid_input("z must be a finite positive number"));
        }
        let last = check_series(series, config)?;

        let origin = series.points()[0].period.ordinal();
        let xs: Vec<f64> = series
            .points()
            .iter()
            .map(|p| (p.period.ordinal() - origin) as f64)
            .collect();
        let ys = series.values();
        let model = fit(&xs, &ys)?;

        let mut points = Vec::with_capacity(config.horizon() as usize);
        for period in future_periods(last, config.horizon()) {
            let x = (period.ordinal() - origin) as f64;
            let raw = model.intercept + model.slope * x;
            if !raw.is_finite() {
                return Err(ForecastError::fit(format!("prediction for {period} is not finite")));
            }
            let yhat = round2(raw.max(0.0));
            let point = ForecastPoint::new(series.category(), period, yhat);

            points.push(match model.residual_std {
                Some(s) => {
                    let leverage = 1.0 + 1.0 / model.n as f64 + (x - model.x_mean).powi(2) / model.sxx;
                    let half_width = self.z * s * leverage.sqrt();
                    point.with_bounds(
                        round2((yhat - half_width).max(0.0)),
                        round2(yhat + half_width),
                    )
                }
                None => point,
            });
        }
        Ok(points)
    }
}
