//! Raw tabular datasets as loaded from CSV.

use core::fmt;
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// Which of the three input files a dataset is. The role comes from the file,
/// never from a column.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetRole {
    Sales,
    TrayWaste,
    PlateWaste,
}

impl DatasetRole {
    pub const ALL: [DatasetRole; 3] = [
        DatasetRole::Sales,
        DatasetRole::TrayWaste,
        DatasetRole::PlateWaste,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetRole::Sales => "sales",
            DatasetRole::TrayWaste => "tray_waste",
            DatasetRole::PlateWaste => "plate_waste",
        }
    }

    /// File name of this dataset inside the data directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            DatasetRole::Sales => "sales.csv",
            DatasetRole::TrayWaste => "tray_waste.csv",
            DatasetRole::PlateWaste => "plate_waste.csv",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == name)
    }
}

impl fmt::Display for DatasetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A required input column.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Column {
    Region,
    City,
    Site,
    Month,
    Week,
    Category,
    Dish,
    Value,
}

pub const REQUIRED_COLUMNS: [Column; 8] = [
    Column::Region,
    Column::City,
    Column::Site,
    Column::Month,
    Column::Week,
    Column::Category,
    Column::Dish,
    Column::Value,
];

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Column::Region => "region",
            Column::City => "city",
            Column::Site => "site",
            Column::Month => "month",
            Column::Week => "week",
            Column::Category => "category",
            Column::Dish => "dish",
            Column::Value => "value",
        }
    }

    /// Header spelling used by the kitchens' own exports.
    fn italian_alias(&self) -> &'static str {
        match self {
            Column::Region => "regione",
            Column::City => "città",
            Column::Site => "scuola",
            Column::Month => "mese",
            Column::Week => "settimana",
            Column::Category => "categoria piatto",
            Column::Dish => "piatto",
            Column::Value => "valore",
        }
    }

    fn matches(&self, header: &str) -> bool {
        let h = header.trim().to_lowercase();
        h == self.name() || h == self.italian_alias()
    }
}

/// A dataset as read from CSV: headers plus string cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDataset {
    role: DatasetRole,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    /// 1-based data rows whose bytes were not valid UTF-8.
    lossy_rows: Vec<usize>,
}

impl RawDataset {
    pub fn new(role: DatasetRole, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            role,
            headers,
            rows,
            lossy_rows: Vec::new(),
        }
    }

    /// Parse CSV with a header row. Short rows are accepted (missing cells
    /// read as empty); long rows are kept as-is for the ingestor to reject.
    ///
    /// The header must be valid UTF-8. Data rows that are not (legacy
    /// Windows-1252 exports) are decoded lossily and listed in
    /// [`RawDataset::lossy_rows`].
    pub fn from_csv_reader<R: Read>(role: DatasetRole, reader: R) -> Result<Self, IngestError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let csv_error = |e: csv::Error| IngestError::Csv {
            role,
            detail: e.to_string(),
        };

        let headers = rdr
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        let mut lossy_rows = Vec::new();
        for (i, result) in rdr.byte_records().enumerate() {
            let record = result.map_err(csv_error)?;
            if record.iter().any(|cell| std::str::from_utf8(cell).is_err()) {
                lossy_rows.push(i + 1);
            }
            rows.push(
                record
                    .iter()
                    .map(|cell| String::from_utf8_lossy(cell).into_owned())
                    .collect(),
            );
        }

        Ok(Self {
            role,
            headers,
            rows,
            lossy_rows,
        })
    }

    pub fn from_csv_str(role: DatasetRole, text: &str) -> Result<Self, IngestError> {
        Self::from_csv_reader(role, text.as_bytes())
    }

    pub fn role(&self) -> DatasetRole {
        self.role
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn lossy_rows(&self) -> &[usize] {
        &self.lossy_rows
    }

    pub fn column_index(&self, column: Column) -> Option<usize> {
        self.headers.iter().position(|h| column.matches(h))
    }

    pub fn missing_columns(&self) -> Vec<&'static str> {
        REQUIRED_COLUMNS
            .iter()
            .filter(|c| self.column_index(**c).is_none())
            .map(|c| c.name())
            .collect()
    }

    /// Fail with a schema error unless every required column is present.
    pub fn validate_schema(&self) -> Result<(), IngestError> {
        let missing = self.missing_columns();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(IngestError::Schema {
                role: self.role,
                missing,
            })
        }
    }
}

/// The three datasets of one job run. Waste datasets are optional: an absent
/// waste file means no waste was measured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputBundle {
    pub sales: Option<RawDataset>,
    pub tray_waste: Option<RawDataset>,
    pub plate_waste: Option<RawDataset>,
}

impl InputBundle {
    pub fn get(&self, role: DatasetRole) -> Option<&RawDataset> {
        match role {
            DatasetRole::Sales => self.sales.as_ref(),
            DatasetRole::TrayWaste => self.tray_waste.as_ref(),
            DatasetRole::PlateWaste => self.plate_waste.as_ref(),
        }
    }

    pub fn set(&mut self, dataset: RawDataset) {
        match dataset.role() {
            DatasetRole::Sales => self.sales = Some(dataset),
            DatasetRole::TrayWaste => self.tray_waste = Some(dataset),
            DatasetRole::PlateWaste => self.plate_waste = Some(dataset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn italian_headers_are_recognized() {
        let csv = "Regione,Città,Scuola,Mese,Settimana,Categoria piatto,Piatto,Valore\n\
                   Lazio,Roma,S1,2024-03,1,Primi,Pasta,10\n";
        let ds = RawDataset::from_csv_str(DatasetRole::Sales, csv).unwrap();
        assert!(ds.missing_columns().is_empty());
        assert_eq!(ds.column_index(Column::Category), Some(5));
        assert_eq!(ds.rows().len(), 1);
    }

    #[test]
    fn headers_are_trimmed_and_case_insensitive() {
        let csv = " Region , CITY,site,Month,week,Category,Dish,VALUE\n";
        let ds = RawDataset::from_csv_str(DatasetRole::TrayWaste, csv).unwrap();
        assert!(ds.validate_schema().is_ok());
    }

    #[test]
    fn missing_columns_are_reported_by_name() {
        let csv = "region,city,site,month,week,dish,value\n";
        let ds = RawDataset::from_csv_str(DatasetRole::Sales, csv).unwrap();
        match ds.validate_schema().unwrap_err() {
            IngestError::Schema { role, missing } => {
                assert_eq!(role, DatasetRole::Sales);
                assert_eq!(missing, vec!["category"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn short_rows_are_accepted() {
        let csv = "region,city,site,month,week,category,dish,value\nLazio,Roma\n";
        let ds = RawDataset::from_csv_str(DatasetRole::Sales, csv).unwrap();
        assert_eq!(ds.rows()[0].len(), 2);
    }

    #[test]
    fn roles_map_to_file_names() {
        assert_eq!(DatasetRole::PlateWaste.file_name(), "plate_waste.csv");
        assert_eq!(DatasetRole::from_name("tray_waste"), Some(DatasetRole::TrayWaste));
        assert_eq!(DatasetRole::from_name("nope"), None);
    }

    #[test]
    fn invalid_utf8_in_a_row_does_not_lose_the_dataset() {
        let mut csv = b"region,city,site,month,week,category,dish,value\n".to_vec();
        csv.extend_from_slice(b"Lazio,Roma,S1,2024-03,1,Dolci,Tiramis\xf9,10\n");
        csv.extend_from_slice(b"Lazio,Roma,S1,2024-03,1,Primi,Pasta,7\n");

        let ds = RawDataset::from_csv_reader(DatasetRole::Sales, csv.as_slice()).unwrap();
        assert_eq!(ds.rows().len(), 2);
        assert_eq!(ds.lossy_rows(), &[1]);
        assert_eq!(ds.rows()[0][6], "Tiramis\u{fffd}");
        assert_eq!(ds.rows()[1][6], "Pasta");
    }

    #[test]
    fn invalid_utf8_in_the_header_is_fatal() {
        let csv = b"region,city,site,month,week,categor\xeda,dish,value\n".to_vec();
        assert!(matches!(
            RawDataset::from_csv_reader(DatasetRole::Sales, csv.as_slice()),
            Err(IngestError::Csv { role: DatasetRole::Sales, .. })
        ));
    }
}
