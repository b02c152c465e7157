use std::fmt;
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::{normalize_column, Table};
use crate::error::ExplorerError;

/// Category group an indicator belongs to, used to organize selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorGroup {
    Economic,
    Lifestyle,
    Environment,
}

impl fmt::Display for IndicatorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorGroup::Economic => write!(f, "Economic"),
            IndicatorGroup::Lifestyle => write!(f, "Lifestyle"),
            IndicatorGroup::Environment => write!(f, "Environment"),
        }
    }
}

/// Whether higher or lower raw values represent a better outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::HigherIsBetter => write!(f, "higher is better"),
            Polarity::LowerIsBetter => write!(f, "lower is better"),
        }
    }
}

/// The standard five-level category vocabulary. Ordering follows the
/// vocabulary (Very Low < ... < Very High), never the alphabet: a chart
/// axis showing only {Very Low, High} still puts Very Low first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CategoryLevel {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl CategoryLevel {
    pub const ALL: [CategoryLevel; 5] = [
        CategoryLevel::VeryLow,
        CategoryLevel::Low,
        CategoryLevel::Moderate,
        CategoryLevel::High,
        CategoryLevel::VeryHigh,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CategoryLevel::VeryLow => "Very Low",
            CategoryLevel::Low => "Low",
            CategoryLevel::Moderate => "Moderate",
            CategoryLevel::High => "High",
            CategoryLevel::VeryHigh => "Very High",
        }
    }

    /// Position within the standard ordering, 0-based.
    pub fn rank(self) -> usize {
        self as usize
    }

    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|level| level.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for CategoryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// True when every label belongs to the standard five-level vocabulary.
pub fn is_standard_vocabulary<'a>(labels: impl IntoIterator<Item = &'a str>) -> bool {
    let mut any = false;
    for label in labels {
        if CategoryLevel::parse(label).is_none() {
            return false;
        }
        any = true;
    }
    any
}

/// Order labels for display: by the standard vocabulary when every label
/// is standard, alphabetically otherwise (the documented fallback for
/// label sets without a defined vocabulary).
pub fn order_labels(labels: &[String]) -> Vec<String> {
    let mut ordered: Vec<String> = labels.to_vec();
    ordered.sort();
    ordered.dedup();
    if is_standard_vocabulary(ordered.iter().map(String::as_str)) {
        ordered.sort_by_key(|l| CategoryLevel::parse(l).map(CategoryLevel::rank).unwrap_or(usize::MAX));
    }
    ordered
}

/// Static definition of one indicator. Indicators are configuration, not
/// something re-derived from column names on every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorDef {
    pub name: String,
    pub group: IndicatorGroup,
    pub polarity: Polarity,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    indicators: Vec<IndicatorDef>,
}

/// The indicator catalog: built-in defaults for the Numbeo quality-of-life
/// indices, optionally overridden or extended from a YAML file.
#[derive(Debug, Clone)]
pub struct Catalog {
    defs: Vec<IndicatorDef>,
}

fn def(
    name: &str,
    group: IndicatorGroup,
    polarity: Polarity,
    note: &str,
    description: &str,
) -> IndicatorDef {
    IndicatorDef {
        name: name.to_string(),
        group,
        polarity,
        note: Some(note.to_string()),
        description: Some(description.to_string()),
    }
}

impl Catalog {
    /// The built-in nine-indicator catalog.
    pub fn builtin() -> Self {
        use IndicatorGroup::{Economic, Environment, Lifestyle};
        use Polarity::{HigherIsBetter, LowerIsBetter};

        Catalog {
            defs: vec![
                def(
                    "Purchasing Power",
                    Economic,
                    HigherIsBetter,
                    "Higher is better: A higher value means residents can buy more with their income.",
                    "Measures residents' buying capacity; spans 10.33 (Uganda) to 195.55 (Luxembourg) with a global mean of 72.67.",
                ),
                def(
                    "Cost Of Living",
                    Economic,
                    LowerIsBetter,
                    "Lower is better: Lower scores mean more affordable living expenses.",
                    "Gauges the expense of essentials like food, rent and transportation, benchmarked against New York City (NYC = 100).",
                ),
                def(
                    "Property Price To Income",
                    Economic,
                    LowerIsBetter,
                    "Lower is better: Indicates more affordable housing relative to income.",
                    "Housing affordability relative to income; ranges from 2.81 to 1075.92, revealing vast disparities between markets.",
                ),
                def(
                    "Quality Of Life",
                    Lifestyle,
                    HigherIsBetter,
                    "Higher is better: Indicates better overall living conditions.",
                    "Empirical composite of economic stability, healthcare access, safety, environment and infrastructure quality.",
                ),
                def(
                    "Safety",
                    Lifestyle,
                    HigherIsBetter,
                    "Higher is better: Indicates lower crime rates and more efficient law enforcement.",
                    "Assesses crime rates, public safety and law enforcement efficiency; ranges 25.36 to 84.43 with mean 57.91.",
                ),
                def(
                    "Traffic Commute Time",
                    Lifestyle,
                    LowerIsBetter,
                    "Lower is better: Means shorter daily commute times and better work-life balance.",
                    "Tracks average commute times; ranges 15.67 to 65.31 with mean 35.43, tied to infrastructure and urban planning.",
                ),
                def(
                    "Health Care",
                    Lifestyle,
                    HigherIsBetter,
                    "Higher is better: Reflects better medical infrastructure, accessibility, and efficiency.",
                    "Evaluates medical infrastructure, accessibility and efficiency; ranges 41.05 to 86.50 with mean 62.60.",
                ),
                def(
                    "Pollution",
                    Environment,
                    LowerIsBetter,
                    "Lower is better: Indicates cleaner air and better environmental conditions.",
                    "Measures air and environmental pollution; ranges from 11.83 (Finland) to 89.41 (Lebanon) with mean 56.15.",
                ),
                def(
                    "Climate",
                    Environment,
                    HigherIsBetter,
                    "Higher is better: Suggests more favorable weather conditions.",
                    "Evaluates weather conditions for livability; spans -3.54 (Mongolia) to 99.89 (Guatemala) with mean 77.83.",
                ),
            ],
        }
    }

    /// Load a YAML catalog and merge it over the built-in defaults:
    /// entries with a known name replace the default, new names extend it.
    pub fn load(path: Option<&Path>) -> Result<Self, ExplorerError> {
        let mut catalog = Self::builtin();
        let Some(path) = path else {
            return Ok(catalog);
        };
        let text = std::fs::read_to_string(path).map_err(|source| ExplorerError::CatalogRead {
            path: path.to_path_buf(),
            source,
        })?;
        let file: CatalogFile =
            serde_yaml::from_str(&text).map_err(|source| ExplorerError::CatalogParse {
                path: path.to_path_buf(),
                source,
            })?;
        for mut over in file.indicators {
            over.name = normalize_column(&over.name);
            match catalog.defs.iter_mut().find(|d| d.name == over.name) {
                Some(existing) => *existing = over,
                None => catalog.defs.push(over),
            }
        }
        Ok(catalog)
    }

    pub fn defs(&self) -> &[IndicatorDef] {
        &self.defs
    }

    pub fn get(&self, name: &str) -> Option<&IndicatorDef> {
        let name = normalize_column(name);
        self.defs.iter().find(|d| d.name == name)
    }

    /// Resolve the catalog against a loaded table, matching each
    /// indicator's `<name> Value` / `<name> Category` columns (or a bare
    /// `<name>` numeric column) exactly once. Suffix parsing happens here
    /// and nowhere else.
    pub fn resolve(&self, table: &Table) -> ResolvedCatalog {
        let mut indicators = Vec::new();
        for def in &self.defs {
            let value_name = format!("{} Value", def.name);
            let value_column = if table.has_numeric_column(&value_name) {
                Some(value_name)
            } else if table.has_numeric_column(&def.name) {
                Some(def.name.clone())
            } else {
                None
            };
            let category_name = format!("{} Category", def.name);
            let category_column = table.has_label_column(&category_name).then_some(category_name);

            if value_column.is_none() && category_column.is_none() {
                debug!("indicator '{}' has no columns in this dataset", def.name);
                continue;
            }
            indicators.push(ResolvedIndicator {
                def: def.clone(),
                value_column,
                category_column,
            });
        }
        ResolvedCatalog { indicators }
    }
}

/// Strip a `Value`/`Category` suffix from a normalized column name to get
/// the base indicator name.
pub fn base_name(column: &str) -> String {
    let column = normalize_column(column);
    column
        .strip_suffix(" Value")
        .or_else(|| column.strip_suffix(" Category"))
        .unwrap_or(&column)
        .to_string()
}

/// Tagged indicator kind, decided at resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Continuous,
    Categorical,
}

/// An indicator bound to the concrete columns of a loaded table.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedIndicator {
    pub def: IndicatorDef,
    pub value_column: Option<String>,
    pub category_column: Option<String>,
}

impl ResolvedIndicator {
    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn polarity(&self) -> Polarity {
        self.def.polarity
    }

    /// Continuous when a numeric value column exists; categorical only
    /// when labels are all the indicator has.
    pub fn kind(&self) -> IndicatorKind {
        if self.value_column.is_some() {
            IndicatorKind::Continuous
        } else {
            IndicatorKind::Categorical
        }
    }
}

/// The catalog after one-time resolution against a table.
#[derive(Debug, Clone)]
pub struct ResolvedCatalog {
    indicators: Vec<ResolvedIndicator>,
}

impl ResolvedCatalog {
    pub fn indicators(&self) -> &[ResolvedIndicator] {
        &self.indicators
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedIndicator> {
        let name = base_name(name);
        self.indicators.iter().find(|i| i.def.name == name)
    }

    pub fn in_group(&self, group: IndicatorGroup) -> Vec<&ResolvedIndicator> {
        self.indicators.iter().filter(|i| i.def.group == group).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::CountryRecord;

    #[test]
    fn builtin_polarities_match_the_numbeo_set() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.get("Pollution").unwrap().polarity, Polarity::LowerIsBetter);
        // Lookup accepts column names and sloppy casing.
        assert_eq!(catalog.get(&base_name("Safety Value")).unwrap().polarity, Polarity::HigherIsBetter);
        assert_eq!(catalog.get(&base_name("cost of living value")).unwrap().polarity, Polarity::LowerIsBetter);
        assert!(catalog.get("Internet Speed").is_none());
    }

    #[test]
    fn category_levels_order_by_vocabulary_not_alphabet() {
        assert!(CategoryLevel::VeryLow < CategoryLevel::High);
        let ordered = order_labels(&["High".to_string(), "Very Low".to_string()]);
        assert_eq!(ordered, ["Very Low", "High"]);
    }

    #[test]
    fn nonstandard_labels_fall_back_to_alphabetical() {
        let ordered = order_labels(&[
            "Tropical".to_string(),
            "Arid".to_string(),
            "Temperate".to_string(),
        ]);
        assert_eq!(ordered, ["Arid", "Temperate", "Tropical"]);
    }

    #[test]
    fn parses_levels_case_insensitively() {
        assert_eq!(CategoryLevel::parse(" very high "), Some(CategoryLevel::VeryHigh));
        assert_eq!(CategoryLevel::parse("moderate"), Some(CategoryLevel::Moderate));
        assert_eq!(CategoryLevel::parse("Medium"), None);
    }

    fn sample_table() -> Table {
        Table::from_records(vec![
            CountryRecord::new("Finland", "Europe")
                .with_value("Safety Value", 75.0)
                .with_label("Safety Category", "Very High")
                .with_value("Climate", 55.0),
            CountryRecord::new("Lebanon", "Asia")
                .with_value("Safety Value", 52.0)
                .with_label("Safety Category", "Moderate")
                .with_value("Climate", 90.0),
        ])
    }

    #[test]
    fn resolution_binds_columns_once() {
        let resolved = Catalog::builtin().resolve(&sample_table());

        let safety = resolved.get("Safety").unwrap();
        assert_eq!(safety.value_column.as_deref(), Some("Safety Value"));
        assert_eq!(safety.category_column.as_deref(), Some("Safety Category"));
        assert_eq!(safety.kind(), IndicatorKind::Continuous);

        // A bare numeric column named like the indicator also binds.
        let climate = resolved.get("Climate").unwrap();
        assert_eq!(climate.value_column.as_deref(), Some("Climate"));
        assert!(climate.category_column.is_none());

        // Indicators absent from the table are not resolved.
        assert!(resolved.get("Pollution").is_none());
        // Lookup accepts column names too.
        assert!(resolved.get("Safety Value").is_some());
    }

    #[test]
    fn yaml_overrides_merge_over_builtin() {
        use std::io::Write;
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "indicators:\n  - name: climate\n    group: environment\n    polarity: lower_is_better\n  - name: Internet Speed\n    group: lifestyle\n    polarity: higher_is_better\n    note: Higher is better."
        )
        .unwrap();
        file.flush().unwrap();

        let catalog = Catalog::load(Some(file.path())).unwrap();
        assert_eq!(catalog.get("Climate").unwrap().polarity, Polarity::LowerIsBetter);
        let extra = catalog.get("Internet Speed").unwrap();
        assert_eq!(extra.group, IndicatorGroup::Lifestyle);
        assert_eq!(catalog.defs().len(), 10);
    }
}
