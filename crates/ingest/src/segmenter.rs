//! Group consumption records into per-category time series.

use std::collections::BTreeMap;

use kitchencast_core::{CategoryTimeSeries, DomainResult, Frequency, Period};

use crate::ingestor::ConsumptionRecord;

/// Build one ordered series per dish category, sorted by category name.
///
/// Weekly keeps one point per (month, week); Monthly sums the weeks of a
/// month. Categories without records do not appear at all.
pub fn segment(
    records: &[ConsumptionRecord],
    frequency: Frequency,
) -> DomainResult<Vec<CategoryTimeSeries>> {
    let mut by_category: BTreeMap<&str, Vec<(Period, f64)>> = BTreeMap::new();

    for record in records {
        let period = Period::bucket(frequency, record.key.month, record.key.week)?;
        by_category
            .entry(record.category())
            .or_default()
            .push((period, record.net_consumption));
    }

    by_category
        .into_iter()
        .map(|(category, observations)| CategoryTimeSeries::from_observations(category, observations))
        .filter(|series| series.as_ref().map_or(true, |s| !s.is_empty()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestor::ConsumptionKey;
    use kitchencast_core::MonthKey;

    fn record(category: &str, dish: &str, month: u32, week: u32, gross: f64) -> ConsumptionRecord {
        ConsumptionRecord::new(
            ConsumptionKey {
                region: "Lazio".into(),
                city: "Roma".into(),
                site: "S1".into(),
                month: MonthKey::new(2024, month).unwrap(),
                week,
                category: category.into(),
                dish: dish.into(),
            },
            gross,
            0.0,
            0.0,
        )
    }

    #[test]
    fn weekly_keeps_each_week_and_sums_dishes() {
        let records = vec![
            record("Primi", "Pasta", 3, 1, 10.0),
            record("Primi", "Risotto", 3, 1, 5.0),
            record("Primi", "Pasta", 3, 2, 7.0),
        ];
        let series = segment(&records, Frequency::Weekly).unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series[0].values(), vec![15.0, 7.0]);
        assert_eq!(series[0].points()[1].period.label(), "2024-03-W2");
    }

    #[test]
    fn monthly_sums_weeks_within_a_month() {
        let records = vec![
            record("Primi", "Pasta", 3, 1, 10.0),
            record("Primi", "Pasta", 3, 4, 5.0),
            record("Primi", "Pasta", 4, 1, 2.0),
        ];
        let series = segment(&records, Frequency::Monthly).unwrap();

        assert_eq!(series[0].values(), vec![15.0, 2.0]);
        assert_eq!(series[0].points()[0].period.label(), "2024-03");
    }

    #[test]
    fn output_is_ordered_by_category_name() {
        let records = vec![
            record("Secondi", "Pollo", 3, 1, 1.0),
            record("Contorni", "Insalata", 3, 1, 1.0),
            record("Primi", "Pasta", 3, 1, 1.0),
        ];
        let names: Vec<_> = segment(&records, Frequency::Weekly)
            .unwrap()
            .iter()
            .map(|s| s.category().to_string())
            .collect();
        assert_eq!(names, vec!["Contorni", "Primi", "Secondi"]);
    }

    #[test]
    fn no_records_means_no_series() {
        assert!(segment(&[], Frequency::Weekly).unwrap().is_empty());
    }
}
