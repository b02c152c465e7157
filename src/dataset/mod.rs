use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ExplorerError;

/// Canonical name of the country key column after normalization.
pub const COUNTRY: &str = "Country";
/// Canonical name of the continent column after normalization.
pub const CONTINENT: &str = "Continent";

/// One row of the dataset: a country, its continent, and the indicator
/// values observed for it. Numeric indicators and categorical labels are
/// kept apart so lookups are typed; a missing entry means the indicator
/// is not applicable to this country.
#[derive(Debug, Clone, Serialize)]
pub struct CountryRecord {
    pub country: String,
    pub continent: String,
    values: HashMap<String, f64>,
    labels: HashMap<String, String>,
}

impl CountryRecord {
    pub fn new(country: impl Into<String>, continent: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            continent: continent.into(),
            values: HashMap::new(),
            labels: HashMap::new(),
        }
    }

    pub fn with_value(mut self, column: impl Into<String>, value: f64) -> Self {
        self.values.insert(column.into(), value);
        self
    }

    pub fn with_label(mut self, column: impl Into<String>, label: impl Into<String>) -> Self {
        self.labels.insert(column.into(), label.into());
        self
    }

    /// Numeric value for `column`, `None` when absent.
    pub fn value(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied()
    }

    /// Categorical label for `column`, `None` when absent.
    pub fn label(&self, column: &str) -> Option<&str> {
        self.labels.get(column).map(String::as_str)
    }
}

/// Read-only in-memory table, loaded once and shared by reference.
/// All derived computations (filtering, aggregation, views) are pure
/// functions over this snapshot; nothing mutates it after load.
#[derive(Debug, Clone)]
pub struct Table {
    records: Vec<CountryRecord>,
    numeric_columns: Vec<String>,
    label_columns: Vec<String>,
}

impl Table {
    /// Build a table with an explicit column order (source order, as the
    /// loader discovered it).
    pub(crate) fn with_columns(
        records: Vec<CountryRecord>,
        numeric_columns: Vec<String>,
        label_columns: Vec<String>,
    ) -> Self {
        Self {
            records,
            numeric_columns,
            label_columns,
        }
    }

    /// Build a table from records alone, discovering columns from the
    /// records themselves (sorted alphabetically for determinism).
    pub fn from_records(records: Vec<CountryRecord>) -> Self {
        let mut numeric = BTreeSet::new();
        let mut label = BTreeSet::new();
        for record in &records {
            numeric.extend(record.values.keys().cloned());
            label.extend(record.labels.keys().cloned());
        }
        Self {
            records,
            numeric_columns: numeric.into_iter().collect(),
            label_columns: label.into_iter().collect(),
        }
    }

    pub fn records(&self) -> &[CountryRecord] {
        &self.records
    }

    /// All rows as references, in original order. The row-slice form the
    /// filter and aggregation engines consume.
    pub fn rows(&self) -> Vec<&CountryRecord> {
        self.records.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric_columns
    }

    pub fn label_columns(&self) -> &[String] {
        &self.label_columns
    }

    pub fn has_numeric_column(&self, name: &str) -> bool {
        self.numeric_columns.iter().any(|c| c == name)
    }

    pub fn has_label_column(&self, name: &str) -> bool {
        self.label_columns.iter().any(|c| c == name)
    }

    /// Distinct continents present, sorted.
    pub fn continents(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.records.iter().map(|r| r.continent.as_str()).collect();
        set.into_iter().map(String::from).collect()
    }

    /// Case-insensitive lookup of a country row.
    pub fn find_country(&self, name: &str) -> Option<&CountryRecord> {
        let needle = name.trim();
        self.records
            .iter()
            .find(|r| r.country.eq_ignore_ascii_case(needle))
    }
}

/// Normalize a column name the way the source spreadsheet's quirks demand:
/// trim, collapse whitespace, and title-case each word, so that
/// " cost of living value " and "Cost Of Living Value" address the same
/// column.
pub fn normalize_column(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + chars.as_str().to_lowercase().as_str()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Load the dataset from a CSV file into an immutable [`Table`].
///
/// Column names are normalized before anything else so downstream lookups
/// by indicator name are stable regardless of source formatting. String
/// columns become categorical label columns; every other column is cast
/// to f64 and becomes a numeric indicator column. Rows without a country
/// or continent are dropped.
pub fn load_table(path: &Path) -> Result<Table, ExplorerError> {
    let df = CsvReader::from_path(path)
        .map_err(|source| ExplorerError::Load {
            path: path.to_path_buf(),
            source,
        })?
        .has_header(true)
        .finish()
        .map_err(|source| ExplorerError::Load {
            path: path.to_path_buf(),
            source,
        })?;

    if df.height() == 0 {
        return Err(ExplorerError::EmptyDataset {
            path: path.to_path_buf(),
        });
    }

    // Classify columns once, keeping source order. Series clones are cheap
    // (shared buffers), and casting up front means row assembly below is a
    // plain typed loop.
    let mut country_col: Option<Series> = None;
    let mut continent_col: Option<Series> = None;
    let mut numeric_cols: Vec<(String, Series)> = Vec::new();
    let mut label_cols: Vec<(String, Series)> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for series in df.get_columns() {
        let name = normalize_column(series.name());
        if !seen.insert(name.clone()) {
            warn!("duplicate column '{}' after normalization, keeping the first", name);
            continue;
        }
        if name == COUNTRY {
            country_col = Some(series.clone());
        } else if name == CONTINENT {
            continent_col = Some(series.clone());
        } else if series.dtype() == &DataType::String {
            label_cols.push((name, series.clone()));
        } else if series.dtype().is_numeric() {
            match series.cast(&DataType::Float64) {
                Ok(cast) => numeric_cols.push((name, cast)),
                Err(e) => warn!("skipping column '{}': cannot cast to f64 ({})", name, e),
            }
        } else {
            debug!("skipping column '{}' with unsupported dtype {:?}", name, series.dtype());
        }
    }

    let country_col = country_col.ok_or(ExplorerError::MissingColumn(COUNTRY))?;
    let continent_col = continent_col.ok_or(ExplorerError::MissingColumn(CONTINENT))?;
    let country_ca = country_col.str().map_err(|source| ExplorerError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    let continent_ca = continent_col.str().map_err(|source| ExplorerError::Load {
        path: path.to_path_buf(),
        source,
    })?;

    let mut records = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (country, continent) = match (country_ca.get(i), continent_ca.get(i)) {
            (Some(country), Some(continent)) => {
                (country.trim().to_string(), continent.trim().to_string())
            }
            _ => {
                debug!("dropping row {}: missing country or continent", i);
                continue;
            }
        };
        if country.is_empty() || continent.is_empty() {
            debug!("dropping row {}: blank country or continent", i);
            continue;
        }

        let mut record = CountryRecord::new(country, continent);
        for (name, series) in &numeric_cols {
            if let Ok(ca) = series.f64() {
                if let Some(value) = ca.get(i) {
                    record.values.insert(name.clone(), value);
                }
            }
        }
        for (name, series) in &label_cols {
            if let Ok(ca) = series.str() {
                if let Some(label) = ca.get(i) {
                    let label = label.trim();
                    if !label.is_empty() {
                        record.labels.insert(name.clone(), label.to_string());
                    }
                }
            }
        }
        records.push(record);
    }

    if records.is_empty() {
        return Err(ExplorerError::EmptyDataset {
            path: path.to_path_buf(),
        });
    }

    let numeric_columns: Vec<String> = numeric_cols.into_iter().map(|(n, _)| n).collect();
    let label_columns: Vec<String> = label_cols.into_iter().map(|(n, _)| n).collect();

    info!(
        "loaded {} countries, {} numeric and {} categorical indicator columns from '{}'",
        records.len(),
        numeric_columns.len(),
        label_columns.len(),
        path.display()
    );

    Ok(Table::with_columns(records, numeric_columns, label_columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn normalizes_column_names() {
        assert_eq!(normalize_column(" cost of living value "), "Cost Of Living Value");
        assert_eq!(normalize_column("COUNTRY"), "Country");
        assert_eq!(normalize_column("Purchasing  Power\tValue"), "Purchasing Power Value");
        assert_eq!(normalize_column(""), "");
    }

    #[test]
    fn record_lookups_distinguish_values_from_labels() {
        let record = CountryRecord::new("Finland", "Europe")
            .with_value("Pollution Value", 11.83)
            .with_label("Pollution Category", "Very Low");

        assert_eq!(record.value("Pollution Value"), Some(11.83));
        assert_eq!(record.value("Pollution Category"), None);
        assert_eq!(record.label("Pollution Category"), Some("Very Low"));
        assert_eq!(record.label("Safety Category"), None);
    }

    #[test]
    fn from_records_discovers_columns() {
        let table = Table::from_records(vec![
            CountryRecord::new("Luxembourg", "Europe")
                .with_value("Purchasing Power Value", 195.55),
            CountryRecord::new("Uganda", "Africa")
                .with_value("Purchasing Power Value", 10.33)
                .with_label("Safety Category", "Low"),
        ]);

        assert_eq!(table.numeric_columns(), ["Purchasing Power Value"]);
        assert_eq!(table.label_columns(), ["Safety Category"]);
        assert_eq!(table.continents(), ["Africa", "Europe"]);
        assert!(table.find_country("uganda").is_some());
        assert!(table.find_country("Atlantis").is_none());
    }

    #[test]
    fn loads_csv_with_messy_headers_and_nulls() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "country,continent, purchasing power value ,safety category").unwrap();
        writeln!(file, "Luxembourg,Europe,195.55,Very High").unwrap();
        writeln!(file, "Uganda,Africa,10.33,").unwrap();
        writeln!(file, "Mongolia,Asia,,Low").unwrap();
        file.flush().unwrap();

        let table = load_table(file.path()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.numeric_columns(), ["Purchasing Power Value"]);
        assert_eq!(table.label_columns(), ["Safety Category"]);

        let uganda = table.find_country("Uganda").unwrap();
        assert_eq!(uganda.value("Purchasing Power Value"), Some(10.33));
        assert_eq!(uganda.label("Safety Category"), None);

        let mongolia = table.find_country("Mongolia").unwrap();
        assert_eq!(mongolia.value("Purchasing Power Value"), None);
        assert_eq!(mongolia.label("Safety Category"), Some("Low"));
    }

    #[test]
    fn empty_source_is_a_load_failure() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "country,continent,safety value").unwrap();
        file.flush().unwrap();

        // A source with no rows is a load failure either way: our empty
        // check, or the reader refusing the file outright.
        match load_table(file.path()) {
            Err(ExplorerError::EmptyDataset { .. }) | Err(ExplorerError::Load { .. }) => {}
            other => panic!("expected a load failure, got {:?}", other.map(|t| t.len())),
        }
    }

    #[test]
    fn missing_key_columns_are_reported() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "nation,continent,safety value").unwrap();
        writeln!(file, "Finland,Europe,75.0").unwrap();
        file.flush().unwrap();

        match load_table(file.path()) {
            Err(ExplorerError::MissingColumn(col)) => assert_eq!(col, COUNTRY),
            other => panic!("expected MissingColumn, got {:?}", other.map(|t| t.len())),
        }
    }
}
