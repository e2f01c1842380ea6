//! Model registry: one descriptor per category attempted in a run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use kitchencast_core::ForecastPoint;
use kitchencast_forecast::{CategoryForecaster, CategoryOutcome, ForecastConfig, ModelDescriptor};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRegistry {
    entries: Vec<ModelDescriptor>,
}

impl ModelRegistry {
    /// Build the registry for a run, ordered by category name.
    pub fn assemble(
        forecaster: &dyn CategoryForecaster,
        config: &ForecastConfig,
        outcomes: &[CategoryOutcome],
        fitted_at: DateTime<Utc>,
    ) -> Self {
        let model_kind = forecaster.model_kind();
        let params = forecaster.params(config);

        let mut entries: Vec<ModelDescriptor> = outcomes
            .iter()
            .map(|o| match &o.result {
                Ok(_) => {
                    ModelDescriptor::success(&o.category, &model_kind, params.clone(), fitted_at)
                }
                Err(e) => ModelDescriptor::failed(
                    &o.category,
                    &model_kind,
                    params.clone(),
                    fitted_at,
                    e,
                ),
            })
            .collect();
        entries.sort_by(|a, b| a.category.cmp(&b.category));
        Self { entries }
    }

    pub fn entries(&self) -> &[ModelDescriptor] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ModelDescriptor> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.entries.iter().filter(|d| d.is_success()).count()
    }

    /// `category -> "success" | "failed: <error>"`.
    pub fn summary(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|d| (d.category.clone(), d.status_line()))
            .collect()
    }
}

/// Union of the forecast points of every successful category, in category
/// order.
pub fn collect_points(outcomes: &[CategoryOutcome]) -> Vec<ForecastPoint> {
    let mut ordered: Vec<&CategoryOutcome> = outcomes.iter().collect();
    ordered.sort_by(|a, b| a.category.cmp(&b.category));
    ordered
        .into_iter()
        .filter_map(|o| o.result.as_ref().ok())
        .flat_map(|points| points.iter().cloned())
        .collect()
}
