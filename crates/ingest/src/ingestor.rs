//! Join sales and waste datasets into cleansed consumption records.
//!
//! Row rules:
//! - `value` that is empty, non-numeric, non-finite or negative is coerced to
//!   0 and reported as a warning. Italian formats are accepted: decimal comma
//!   (`12,5`) and dot grouping (`1.234,5`, `1.234.567`). A lone dot before
//!   exactly three digits (`1.000`) is read as a decimal point, with a warning.
//! - Rows with more cells than the header (usually an unquoted decimal
//!   comma), an empty category, or an unparseable month or week are rejected
//!   (warning, row skipped). Other key cells may be empty.
//! - Rows that were not valid UTF-8 are kept with replacement characters and
//!   reported as a warning.
//! - Repeated keys within one dataset are summed.
//! - Waste with no matching sales key is ignored; sales with no matching
//!   waste key get zero waste.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

use kitchencast_core::{parse_week, MonthKey};

use crate::dataset::{Column, DatasetRole, InputBundle, RawDataset};
use crate::error::IngestError;

/// Composite join key shared by all three datasets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumptionKey {
    pub region: String,
    pub city: String,
    pub site: String,
    pub month: MonthKey,
    pub week: u32,
    pub category: String,
    pub dish: String,
}

/// Cleansed consumption for one key.
///
/// Invariant: `net_consumption == max(0, gross_sales - tray_waste - plate_waste)`
/// and every quantity is non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionRecord {
    pub key: ConsumptionKey,
    pub gross_sales: f64,
    pub tray_waste: f64,
    pub plate_waste: f64,
    pub net_consumption: f64,
}

impl ConsumptionRecord {
    pub fn new(key: ConsumptionKey, gross_sales: f64, tray_waste: f64, plate_waste: f64) -> Self {
        let gross_sales = non_negative(gross_sales);
        let tray_waste = non_negative(tray_waste);
        let plate_waste = non_negative(plate_waste);
        Self {
            key,
            gross_sales,
            tray_waste,
            plate_waste,
            net_consumption: (gross_sales - tray_waste - plate_waste).max(0.0),
        }
    }

    pub fn category(&self) -> &str {
        &self.key.category
    }
}

fn non_negative(x: f64) -> f64 {
    if x.is_finite() && x > 0.0 { x } else { 0.0 }
}

/// A non-fatal row-level problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestWarning {
    pub role: DatasetRole,
    /// 1-based data row (the header is not counted).
    pub row: usize,
    pub message: String,
}

impl fmt::Display for IngestWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} row {}: {}", self.role, self.row, self.message)
    }
}

/// Output of [`ingest`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// One record per distinct sales key, ordered by key.
    pub records: Vec<ConsumptionRecord>,
    pub warnings: Vec<IngestWarning>,
    pub rejected_rows: usize,
    /// Waste keys that had no sales counterpart.
    pub unmatched_waste_keys: usize,
}

/// Validate and join the three datasets.
///
/// Fails only on dataset-level problems: the sales dataset is absent, or a
/// present dataset lacks a required column.
pub fn ingest(bundle: &InputBundle) -> Result<IngestReport, IngestError> {
    let sales = bundle
        .sales
        .as_ref()
        .ok_or(IngestError::MissingDataset(DatasetRole::Sales))?;
    sales.validate_schema()?;
    for role in [DatasetRole::TrayWaste, DatasetRole::PlateWaste] {
        if let Some(ds) = bundle.get(role) {
            ds.validate_schema()?;
        }
    }

    let mut report = IngestReport::default();

    let sales_totals = aggregate(sales, &mut report);
    let mut tray_totals = bundle
        .tray_waste
        .as_ref()
        .map(|ds| aggregate(ds, &mut report))
        .unwrap_or_default();
    let mut plate_totals = bundle
        .plate_waste
        .as_ref()
        .map(|ds| aggregate(ds, &mut report))
        .unwrap_or_default();

    report.records = sales_totals
        .into_iter()
        .map(|(key, gross)| {
            let tray = tray_totals.remove(&key).unwrap_or(0.0);
            let plate = plate_totals.remove(&key).unwrap_or(0.0);
            ConsumptionRecord::new(key, gross, tray, plate)
        })
        .collect();

    report.unmatched_waste_keys = tray_totals.len() + plate_totals.len();
    if report.unmatched_waste_keys > 0 {
        debug!(
            unmatched = report.unmatched_waste_keys,
            "waste rows without matching sales were ignored"
        );
    }

    for w in &report.warnings {
        warn!(role = %w.role, row = w.row, "{}", w.message);
    }

    Ok(report)
}

struct ColumnIndex {
    region: usize,
    city: usize,
    site: usize,
    month: usize,
    week: usize,
    category: usize,
    dish: usize,
    value: usize,
}

impl ColumnIndex {
    /// Only called after schema validation.
    fn resolve(ds: &RawDataset) -> Option<Self> {
        Some(Self {
            region: ds.column_index(Column::Region)?,
            city: ds.column_index(Column::City)?,
            site: ds.column_index(Column::Site)?,
            month: ds.column_index(Column::Month)?,
            week: ds.column_index(Column::Week)?,
            category: ds.column_index(Column::Category)?,
            dish: ds.column_index(Column::Dish)?,
            value: ds.column_index(Column::Value)?,
        })
    }
}

fn aggregate(ds: &RawDataset, report: &mut IngestReport) -> BTreeMap<ConsumptionKey, f64> {
    let mut totals: BTreeMap<ConsumptionKey, f64> = BTreeMap::new();
    let Some(idx) = ColumnIndex::resolve(ds) else {
        return totals;
    };
    let role = ds.role();
    let width = ds.headers().len();

    for (i, row) in ds.rows().iter().enumerate() {
        let row_no = i + 1;
        // Trailing empty cells are tolerated.
        if row.iter().skip(width).any(|extra| !extra.is_empty()) {
            reject_row(
                report,
                role,
                row_no,
                format!("{} cells for {width} columns (unquoted comma?)", row.len()),
            );
            continue;
        }
        if ds.lossy_rows().binary_search(&row_no).is_ok() {
            report.warnings.push(IngestWarning {
                role,
                row: row_no,
                message: "bytes that are not UTF-8 were replaced".to_string(),
            });
        }
        let cell = |col: usize| row.get(col).map(|s| s.trim()).unwrap_or("");

        let category = cell(idx.category);
        if category.is_empty() {
            reject_row(report, role, row_no, "empty category".to_string());
            continue;
        }
        let month = match MonthKey::parse(cell(idx.month)) {
            Ok(m) => m,
            Err(e) => {
                reject_row(report, role, row_no, e.to_string());
                continue;
            }
        };
        let week = match parse_week(cell(idx.week)) {
            Ok(w) => w,
            Err(e) => {
                reject_row(report, role, row_no, e.to_string());
                continue;
            }
        };

        let raw_value = cell(idx.value);
        let value = match parse_value(raw_value) {
            Ok(parsed) => {
                if let Some(caveat) = parsed.caveat {
                    report.warnings.push(IngestWarning {
                        role,
                        row: row_no,
                        message: format!("value '{raw_value}' {caveat}; read as {}", parsed.value),
                    });
                }
                parsed.value
            }
            Err(reason) => {
                report.warnings.push(IngestWarning {
                    role,
                    row: row_no,
                    message: format!("value '{raw_value}' {reason}; using 0"),
                });
                0.0
            }
        };

        let key = ConsumptionKey {
            region: cell(idx.region).to_string(),
            city: cell(idx.city).to_string(),
            site: cell(idx.site).to_string(),
            month,
            week,
            category: category.to_string(),
            dish: cell(idx.dish).to_string(),
        };
        *totals.entry(key).or_insert(0.0) += value;
    }

    totals
}

fn reject_row(report: &mut IngestReport, role: DatasetRole, row: usize, reason: String) {
    report.rejected_rows += 1;
    report.warnings.push(IngestWarning {
        role,
        row,
        message: format!("row rejected: {reason}"),
    });
}

struct ParsedValue {
    value: f64,
    /// Set when the reading is a guess the user should check.
    caveat: Option<&'static str>,
}

fn parse_value(raw: &str) -> Result<ParsedValue, &'static str> {
    if raw.is_empty() {
        return Err("is empty");
    }
    let mut caveat = None;
    let text = match (raw.rfind(','), raw.rfind('.')) {
        // 1.234,5
        (Some(comma), Some(dot)) if comma > dot => raw.replace('.', "").replace(',', "."),
        // 1,234.5
        (Some(_), Some(_)) => raw.replace(',', ""),
        (Some(_), None) => raw.replace(',', "."),
        (None, Some(_)) if raw.matches('.').count() > 1 => {
            if !is_dot_grouped(raw) {
                return Err("is not numeric");
            }
            raw.replace('.', "")
        }
        (None, Some(_)) => {
            if is_dot_grouped(raw) {
                caveat = Some("is ambiguous (thousands separator or decimal point)");
            }
            raw.to_string()
        }
        (None, None) => raw.to_string(),
    };
    let v: f64 = text.parse().map_err(|_| "is not numeric")?;
    if !v.is_finite() {
        return Err("is not finite");
    }
    if v < 0.0 {
        return Err("is negative");
    }
    Ok(ParsedValue { value: v, caveat })
}

/// `1.234` or `12.345.678`: a 1-3 digit lead without a leading zero, then
/// groups of exactly three digits.
fn is_dot_grouped(raw: &str) -> bool {
    let mut groups = raw.split('.');
    let lead_ok = groups.next().is_some_and(|lead| {
        (1..=3).contains(&lead.len())
            && !lead.starts_with('0')
            && lead.bytes().all(|b| b.is_ascii_digit())
    });
    lead_ok && groups.all(|g| g.len() == 3 && g.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HEADER: &str = "region,city,site,month,week,category,dish,value\n";

    fn dataset(role: DatasetRole, rows: &str) -> RawDataset {
        RawDataset::from_csv_str(role, &format!("{HEADER}{rows}")).unwrap()
    }

    fn bundle(sales: &str, tray: Option<&str>, plate: Option<&str>) -> InputBundle {
        InputBundle {
            sales: Some(dataset(DatasetRole::Sales, sales)),
            tray_waste: tray.map(|r| dataset(DatasetRole::TrayWaste, r)),
            plate_waste: plate.map(|r| dataset(DatasetRole::PlateWaste, r)),
        }
    }

    #[test]
    fn net_consumption_subtracts_both_waste_kinds() {
        let report = ingest(&bundle(
            "Lazio,Roma,S1,2024-03,1,Primi,Pasta,100\n",
            Some("Lazio,Roma,S1,2024-03,1,Primi,Pasta,10\n"),
            Some("Lazio,Roma,S1,2024-03,1,Primi,Pasta,5.5\n"),
        ))
        .unwrap();

        assert_eq!(report.records.len(), 1);
        let r = &report.records[0];
        assert_eq!(r.gross_sales, 100.0);
        assert_eq!(r.tray_waste, 10.0);
        assert_eq!(r.plate_waste, 5.5);
        assert_eq!(r.net_consumption, 84.5);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn waste_exceeding_sales_floors_at_zero() {
        let report = ingest(&bundle(
            "Lazio,Roma,S1,2024-03,1,Primi,Pasta,10\n",
            Some("Lazio,Roma,S1,2024-03,1,Primi,Pasta,8\n"),
            Some("Lazio,Roma,S1,2024-03,1,Primi,Pasta,8\n"),
        ))
        .unwrap();
        assert_eq!(report.records[0].net_consumption, 0.0);
    }

    #[test]
    fn missing_waste_match_means_no_waste() {
        let report = ingest(&bundle(
            "Lazio,Roma,S1,2024-03,1,Primi,Pasta,10\n",
            Some("Lazio,Roma,S2,2024-03,1,Primi,Pasta,8\n"),
            None,
        ))
        .unwrap();
        assert_eq!(report.records[0].net_consumption, 10.0);
        assert_eq!(report.unmatched_waste_keys, 1);
    }

    #[test]
    fn join_key_normalizes_month_and_week_spelling() {
        let report = ingest(&bundle(
            "Lazio,Roma,S1,3,1,Primi,Pasta,10\n",
            Some("Lazio,Roma,S1,Marzo,W1,Primi,Pasta,4\n"),
            None,
        ))
        .unwrap();
        assert_eq!(report.records[0].net_consumption, 6.0);
    }

    #[test]
    fn non_numeric_values_become_zero_with_warning() {
        let report = ingest(&bundle(
            "Lazio,Roma,S1,2024-03,1,Primi,Pasta,abc\nLazio,Roma,S1,2024-03,2,Primi,Pasta,\"12,5\"\n",
            None,
            None,
        ))
        .unwrap();

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].gross_sales, 0.0);
        assert_eq!(report.records[1].gross_sales, 12.5);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].row, 1);
        assert!(report.warnings[0].message.contains("not numeric"));
    }

    #[test]
    fn italian_number_formats_are_read() {
        let report = ingest(&bundle(
            "Lazio,Roma,S1,2024-03,1,Primi,Pasta,\"1.234,5\"\n\
             Lazio,Roma,S1,2024-03,2,Primi,Pasta,1.234.567\n\
             Lazio,Roma,S1,2024-03,3,Primi,Pasta,\"1,234.5\"\n\
             Lazio,Roma,S1,2024-03,4,Primi,Pasta,0.250\n",
            None,
            None,
        ))
        .unwrap();

        let gross: Vec<f64> = report.records.iter().map(|r| r.gross_sales).collect();
        assert_eq!(gross, vec![1234.5, 1_234_567.0, 1234.5, 0.25]);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn dot_before_three_digits_is_flagged_as_ambiguous() {
        let report = ingest(&bundle("Lazio,Roma,S1,2024-03,1,Primi,Pasta,1.000\n", None, None)).unwrap();

        assert_eq!(report.records[0].gross_sales, 1.0);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].message.contains("ambiguous"));
        assert!(report.warnings[0].message.contains("read as 1"));
    }

    #[test]
    fn rows_wider_than_the_header_are_rejected() {
        let report = ingest(&bundle(
            "Lazio,Roma,S1,2024-03,1,Contorni,Insalata,5,5\n\
             Lazio,Roma,S1,2024-03,2,Contorni,Insalata,\"5,5\"\n\
             Lazio,Roma,S1,2024-03,2,Contorni,Insalata,1,\n",
            None,
            None,
        ))
        .unwrap();

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].key.week, 2);
        assert_eq!(report.records[0].gross_sales, 6.5);
        assert_eq!(report.rejected_rows, 1);
        assert_eq!(report.warnings[0].row, 1);
        assert!(report.warnings[0].message.contains("9 cells for 8 columns"));
    }

    #[test]
    fn non_utf8_rows_are_kept_with_a_warning() {
        let mut csv = HEADER.as_bytes().to_vec();
        csv.extend_from_slice(b"Lazio,Roma,S1,2024-03,1,Dolci,Tiramis\xf9,10\n");
        csv.extend_from_slice(b"Lazio,Roma,S1,2024-03,1,Primi,Pasta,7\n");
        let sales = RawDataset::from_csv_reader(DatasetRole::Sales, csv.as_slice()).unwrap();

        let report = ingest(&InputBundle {
            sales: Some(sales),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.rejected_rows, 0);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].row, 1);
        assert!(report.warnings[0].message.contains("not UTF-8"));
    }

    #[test]
    fn negative_values_are_coerced_with_warning() {
        let report = ingest(&bundle("Lazio,Roma,S1,2024-03,1,Primi,Pasta,-3\n", None, None)).unwrap();
        assert_eq!(report.records[0].gross_sales, 0.0);
        assert!(report.warnings[0].message.contains("negative"));
    }

    #[test]
    fn rows_without_category_or_period_are_rejected() {
        let report = ingest(&bundle(
            "Lazio,Roma,S1,2024-03,1,,Pasta,10\n\
             Lazio,Roma,S1,someday,1,Primi,Pasta,10\n\
             Lazio,Roma,S1,2024-03,9,Primi,Pasta,10\n\
             Lazio,Roma,S1,2024-03,1,Primi,Pasta,10\n",
            None,
            None,
        ))
        .unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.rejected_rows, 3);
        assert_eq!(report.warnings.len(), 3);
    }

    #[test]
    fn duplicate_sales_keys_are_summed() {
        let report = ingest(&bundle(
            "Lazio,Roma,S1,2024-03,1,Primi,Pasta,10\nLazio,Roma,S1,2024-03,1,Primi,Pasta,5\n",
            None,
            None,
        ))
        .unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].gross_sales, 15.0);
    }

    #[test]
    fn sales_without_category_column_is_a_schema_error() {
        let sales = RawDataset::from_csv_str(
            DatasetRole::Sales,
            "region,city,site,month,week,dish,value\nLazio,Roma,S1,2024-03,1,Pasta,10\n",
        )
        .unwrap();
        let err = ingest(&InputBundle {
            sales: Some(sales),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(
            err,
            IngestError::Schema {
                role: DatasetRole::Sales,
                missing: vec!["category"],
            }
        );
    }

    #[test]
    fn malformed_waste_schema_names_its_role() {
        let tray = RawDataset::from_csv_str(DatasetRole::TrayWaste, "region,value\n").unwrap();
        let mut b = bundle("Lazio,Roma,S1,2024-03,1,Primi,Pasta,10\n", None, None);
        b.tray_waste = Some(tray);
        assert!(matches!(
            ingest(&b).unwrap_err(),
            IngestError::Schema { role: DatasetRole::TrayWaste, .. }
        ));
    }

    #[test]
    fn absent_sales_is_fatal() {
        assert_eq!(
            ingest(&InputBundle::default()).unwrap_err(),
            IngestError::MissingDataset(DatasetRole::Sales)
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        #[test]
        fn net_consumption_is_never_negative(
            gross in -1_000.0f64..10_000.0,
            tray in -1_000.0f64..10_000.0,
            plate in -1_000.0f64..10_000.0,
        ) {
            let row = |v: f64| format!("Lazio,Roma,S1,2024-03,1,Primi,Pasta,{v}\n");
            let report = ingest(&bundle(&row(gross), Some(&row(tray)), Some(&row(plate)))).unwrap();
            let r = &report.records[0];

            let expected = (gross.max(0.0) - tray.max(0.0) - plate.max(0.0)).max(0.0);
            prop_assert!(r.net_consumption >= 0.0);
            prop_assert!((r.net_consumption - expected).abs() < 1e-9);
        }
    }
}
