use std::collections::BTreeSet;
use std::fmt;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use clap::ValueEnum;
use serde::Serialize;
use tracing::info;

use crate::catalog::{
    is_standard_vocabulary, CategoryLevel, IndicatorGroup, IndicatorKind, Polarity,
    ResolvedCatalog,
};
use crate::color::{resolve_categorical, resolve_continuous, ColorScale};
use crate::dataset::{normalize_column, CountryRecord, Table};
use crate::error::ExplorerError;
use crate::filter::{self, FilterSpec, RankDirection, ValueRange};
use crate::stats::{self, GroupField, Stat, Summary};

/// One row of a rendered map/table view.
#[derive(Debug, Clone, Serialize)]
pub struct MapRow {
    pub country: String,
    pub continent: String,
    pub value: Option<f64>,
    pub category: Option<String>,
}

/// One bar of the category-distribution chart.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub label: String,
    pub count: usize,
    pub percentage: f64,
}

/// Everything the renderer needs for the world-map page: the filtered
/// rows, the resolved color scale, summary statistics, and the category
/// distribution. Recomputed from the selection snapshot on every call.
#[derive(Debug, Serialize)]
pub struct MapView {
    pub indicator: String,
    pub column: String,
    pub kind: IndicatorKind,
    pub polarity: Polarity,
    pub scale: ColorScale,
    pub rows: Vec<MapRow>,
    pub summary: Option<Summary>,
    pub extremes: Option<stats::Extremes>,
    /// Full-table value range (slider bounds), continuous indicators only.
    pub full_range: Option<ValueRange>,
    /// 5th..95th percentile of the displayed values, the outlier-robust
    /// color range for choropleth rendering.
    pub robust_range: Option<ValueRange>,
    pub log_scale_recommended: bool,
    pub category_distribution: Option<Vec<CategoryCount>>,
}

impl MapView {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn build_map_view(
    table: &Table,
    catalog: &ResolvedCatalog,
    indicator_name: &str,
    spec: &FilterSpec,
) -> Result<MapView, ExplorerError> {
    let indicator = catalog
        .get(indicator_name)
        .ok_or_else(|| ExplorerError::UnknownIndicator(indicator_name.to_string()))?;
    let selected = filter::filter(table, indicator, spec)?;

    let rows: Vec<MapRow> = selected
        .iter()
        .map(|r| MapRow {
            country: r.country.clone(),
            continent: r.continent.clone(),
            value: indicator.value_column.as_deref().and_then(|c| r.value(c)),
            category: indicator
                .category_column
                .as_deref()
                .and_then(|c| r.label(c))
                .map(String::from),
        })
        .collect();

    let distribution = indicator
        .category_column
        .as_deref()
        .map(|column| category_distribution(table, column, &spec.continents));

    let view = match indicator.kind() {
        IndicatorKind::Continuous => {
            let column = indicator.value_column.clone().expect("continuous indicator");
            // Full-table bounds drive the slider and the log-scale hint;
            // an indicator with no data at all is a no-data state the
            // caller must branch on.
            let all_rows = table.rows();
            let full_range = filter::range_of(&all_rows, &column)?;
            let values: Vec<f64> = selected.iter().filter_map(|r| r.value(&column)).collect();
            let robust_range = match (
                stats::quantile(&values, 0.05),
                stats::quantile(&values, 0.95),
            ) {
                (Some(min), Some(max)) => Some(ValueRange { min, max }),
                _ => None,
            };
            MapView {
                indicator: indicator.name().to_string(),
                column: column.clone(),
                kind: IndicatorKind::Continuous,
                polarity: indicator.polarity(),
                scale: resolve_continuous(indicator.polarity()),
                summary: Summary::of(&values),
                extremes: stats::extremes(&selected, &column),
                log_scale_recommended: full_range.log_scale_recommended(),
                full_range: Some(full_range),
                robust_range,
                rows,
                category_distribution: distribution.clone(),
            }
        }
        IndicatorKind::Categorical => {
            let column = indicator.category_column.clone().expect("categorical indicator");
            let labels: Vec<String> = rows.iter().filter_map(|r| r.category.clone()).collect();
            MapView {
                indicator: indicator.name().to_string(),
                column,
                kind: IndicatorKind::Categorical,
                polarity: indicator.polarity(),
                scale: resolve_categorical(indicator.polarity(), &labels),
                summary: None,
                extremes: None,
                full_range: None,
                robust_range: None,
                log_scale_recommended: false,
                rows,
                category_distribution: distribution,
            }
        }
    };
    Ok(view)
}

/// Category counts over the continent-filtered rows (the distribution
/// panel ignores the value filter). Standard label sets come back in
/// vocabulary order; anything else is ordered by count, largest first.
fn category_distribution(
    table: &Table,
    column: &str,
    continents: &BTreeSet<String>,
) -> Vec<CategoryCount> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for record in table.records() {
        if !continents.contains(&record.continent) {
            continue;
        }
        let Some(label) = record.label(column) else {
            continue;
        };
        match counts.iter_mut().find(|(l, _)| l == label) {
            Some((_, n)) => *n += 1,
            None => counts.push((label.to_string(), 1)),
        }
    }
    let total: usize = counts.iter().map(|(_, n)| n).sum();
    if is_standard_vocabulary(counts.iter().map(|(l, _)| l.as_str())) {
        counts.sort_by_key(|(l, _)| {
            CategoryLevel::parse(l).map(CategoryLevel::rank).unwrap_or(usize::MAX)
        });
    } else {
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    }
    counts
        .into_iter()
        .map(|(label, count)| CategoryCount {
            label,
            count,
            percentage: (count as f64 / total as f64 * 1000.0).round() / 10.0,
        })
        .collect()
}

/// Scope of the global-metrics page.
#[derive(Debug, Clone)]
pub enum MetricsScope {
    /// Continent means across the selected continents.
    Global { continents: BTreeSet<String> },
    /// Country-level values within one continent.
    SingleContinent(String),
}

/// One bar of the metrics chart: a continent (global view) or a country
/// (single-continent view) and its mean indicator value.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsGroup {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct MetricsView {
    pub indicator: String,
    pub column: String,
    pub polarity: Polarity,
    pub scale: ColorScale,
    /// What each group row is: "Continent" or "Country".
    pub level: &'static str,
    /// Statistic computed per group.
    pub stat: Stat,
    pub groups: Vec<MetricsGroup>,
    /// Summary statistics over the grouped values.
    pub summary: Option<Summary>,
}

impl MetricsView {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

pub fn build_metrics_view(
    table: &Table,
    catalog: &ResolvedCatalog,
    indicator_name: &str,
    scope: &MetricsScope,
    stat: Stat,
) -> Result<MetricsView, ExplorerError> {
    let indicator = catalog
        .get(indicator_name)
        .ok_or_else(|| ExplorerError::UnknownIndicator(indicator_name.to_string()))?;
    let column = indicator.value_column.clone().ok_or_else(|| {
        ExplorerError::MissingIndicatorColumn {
            indicator: indicator.name().to_string(),
            expected: "numeric value",
        }
    })?;

    let (continents, level, field) = match scope {
        MetricsScope::Global { continents } => {
            (continents.clone(), "Continent", GroupField::Continent)
        }
        MetricsScope::SingleContinent(name) => {
            let known = table.continents();
            let matched = known
                .iter()
                .find(|c| c.eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| ExplorerError::UnknownEntity {
                    kind: "continent",
                    name: name.clone(),
                })?;
            (
                [matched.clone()].into_iter().collect(),
                "Country",
                GroupField::Country,
            )
        }
    };

    let spec = FilterSpec::new(continents, filter::ValueFilter::Any);
    let selected = filter::filter(table, indicator, &spec)?;
    let columns = vec![column.clone()];
    let groups: Vec<MetricsGroup> = stats::aggregate(&selected, &[field], &columns, stat)
        .into_iter()
        .filter_map(|row| {
            let value = row.value(&column)?;
            Some(MetricsGroup {
                name: row.key_string(),
                value,
            })
        })
        .collect();

    let values: Vec<f64> = groups.iter().map(|g| g.value).collect();
    Ok(MetricsView {
        indicator: indicator.name().to_string(),
        column,
        polarity: indicator.polarity(),
        scale: resolve_continuous(indicator.polarity()),
        level,
        stat,
        summary: Summary::of(&values),
        groups,
    })
}

/// What to compare: two countries directly, or two continents via their
/// per-indicator means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CompareBy {
    Countries,
    Continents,
}

impl fmt::Display for CompareBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareBy::Countries => write!(f, "countries"),
            CompareBy::Continents => write!(f, "continents"),
        }
    }
}

/// Which indicators to melt into the comparison.
#[derive(Debug, Clone)]
pub enum CompareSelection {
    All,
    Group(IndicatorGroup),
    One(String),
}

/// One melted (indicator, value, value) triple.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorPair {
    pub indicator: String,
    pub first: Option<f64>,
    pub second: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ComparisonView {
    pub by: CompareBy,
    pub first: String,
    pub second: String,
    pub rows: Vec<IndicatorPair>,
}

impl ComparisonView {
    /// The single pair when exactly one indicator was compared.
    pub fn single(&self) -> Option<&IndicatorPair> {
        match self.rows.as_slice() {
            [one] => Some(one),
            _ => None,
        }
    }

    /// Absolute difference for single-indicator comparisons with data on
    /// both sides.
    pub fn difference(&self) -> Option<f64> {
        let pair = self.single()?;
        Some((pair.first? - pair.second?).abs())
    }

    /// Entity with the higher value in single-indicator mode; `None` on a
    /// tie or missing data.
    pub fn leader(&self) -> Option<&str> {
        let pair = self.single()?;
        let (a, b) = (pair.first?, pair.second?);
        if a > b {
            Some(&self.first)
        } else if b > a {
            Some(&self.second)
        } else {
            None
        }
    }
}

pub fn build_comparison_view(
    table: &Table,
    catalog: &ResolvedCatalog,
    by: CompareBy,
    first: &str,
    second: &str,
    selection: &CompareSelection,
) -> Result<ComparisonView, ExplorerError> {
    let columns: Vec<String> = match selection {
        CompareSelection::All => table.numeric_columns().to_vec(),
        CompareSelection::Group(group) => catalog
            .in_group(*group)
            .into_iter()
            .filter_map(|i| i.value_column.clone())
            .collect(),
        CompareSelection::One(name) => {
            let column = catalog
                .get(name)
                .and_then(|i| i.value_column.clone())
                .or_else(|| {
                    let normalized = normalize_column(name);
                    table.has_numeric_column(&normalized).then_some(normalized)
                })
                .ok_or_else(|| ExplorerError::UnknownIndicator(name.to_string()))?;
            vec![column]
        }
    };

    let (first_name, first_values) = entity_values(table, by, first, &columns)?;
    let (second_name, second_values) = entity_values(table, by, second, &columns)?;

    let rows = columns
        .iter()
        .enumerate()
        .map(|(i, column)| IndicatorPair {
            indicator: column.clone(),
            first: first_values[i],
            second: second_values[i],
        })
        .collect();

    Ok(ComparisonView {
        by,
        first: first_name,
        second: second_name,
        rows,
    })
}

/// Per-column values of one comparison entity: the country's own row, or
/// the continent's per-column means.
fn entity_values(
    table: &Table,
    by: CompareBy,
    name: &str,
    columns: &[String],
) -> Result<(String, Vec<Option<f64>>), ExplorerError> {
    match by {
        CompareBy::Countries => {
            let record = table
                .find_country(name)
                .ok_or_else(|| ExplorerError::UnknownEntity {
                    kind: "country",
                    name: name.to_string(),
                })?;
            let values = columns.iter().map(|c| record.value(c)).collect();
            Ok((record.country.clone(), values))
        }
        CompareBy::Continents => {
            let known = table.continents();
            let matched = known
                .iter()
                .find(|c| c.eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| ExplorerError::UnknownEntity {
                    kind: "continent",
                    name: name.to_string(),
                })?;
            let members: Vec<&CountryRecord> = table
                .records()
                .iter()
                .filter(|r| &r.continent == matched)
                .collect();
            let agg = stats::aggregate(
                &members,
                &[GroupField::Continent],
                columns,
                Stat::Mean,
            );
            let values = match agg.first() {
                Some(row) => columns.iter().map(|c| row.value(c)).collect(),
                None => vec![None; columns.len()],
            };
            Ok((matched.clone(), values))
        }
    }
}

/// One ranked row of the top-vs-bottom page.
#[derive(Debug, Clone, Serialize)]
pub struct RankedRow {
    pub rank: usize,
    pub country: String,
    pub continent: String,
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct RankView {
    pub indicator: String,
    pub column: String,
    pub polarity: Polarity,
    pub scale: ColorScale,
    pub direction: RankDirection,
    pub requested: usize,
    pub rows: Vec<RankedRow>,
    /// The other end of the ranking in versus mode.
    pub opposite: Option<Vec<RankedRow>>,
}

impl RankView {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.opposite.as_ref().map_or(true, Vec::is_empty)
    }
}

pub fn build_rank_view(
    table: &Table,
    catalog: &ResolvedCatalog,
    indicator_name: &str,
    spec: &FilterSpec,
    n: usize,
    direction: RankDirection,
    versus: bool,
) -> Result<RankView, ExplorerError> {
    let indicator = catalog
        .get(indicator_name)
        .ok_or_else(|| ExplorerError::UnknownIndicator(indicator_name.to_string()))?;
    let column = indicator.value_column.clone().ok_or_else(|| {
        ExplorerError::MissingIndicatorColumn {
            indicator: indicator.name().to_string(),
            expected: "numeric value",
        }
    })?;

    let selected = filter::filter(table, indicator, spec)?;
    let ranked = to_ranked(filter::top_n(&selected, &column, n, direction), &column);
    let opposite = versus.then(|| {
        let other = match direction {
            RankDirection::Top => RankDirection::Bottom,
            RankDirection::Bottom => RankDirection::Top,
        };
        to_ranked(filter::top_n(&selected, &column, n, other), &column)
    });

    Ok(RankView {
        indicator: indicator.name().to_string(),
        column,
        polarity: indicator.polarity(),
        scale: resolve_continuous(indicator.polarity()),
        direction,
        requested: n,
        rows: ranked,
        opposite,
    })
}

fn to_ranked(rows: Vec<&CountryRecord>, column: &str) -> Vec<RankedRow> {
    rows.into_iter()
        .enumerate()
        .filter_map(|(i, r)| {
            Some(RankedRow {
                rank: i + 1,
                country: r.country.clone(),
                continent: r.continent.clone(),
                value: r.value(column)?,
            })
        })
        .collect()
}

fn csv_field(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

/// Export the displayed table as CSV: country, continent, and the
/// selected indicator column.
pub fn export_csv(path: &Path, view: &MapView) -> Result<(), ExplorerError> {
    let wrap = |source| ExplorerError::Export {
        path: path.to_path_buf(),
        source,
    };
    let mut out = std::fs::File::create(path).map_err(wrap)?;
    writeln!(out, "Country,Continent,{}", csv_field(&view.column)).map_err(wrap)?;
    for row in &view.rows {
        let cell = match (row.value, &row.category) {
            (Some(v), _) if view.kind == IndicatorKind::Continuous => format!("{:.2}", v),
            (_, Some(label)) => csv_field(label),
            (Some(v), None) => format!("{:.2}", v),
            (None, None) => String::new(),
        };
        writeln!(
            out,
            "{},{},{}",
            csv_field(&row.country),
            csv_field(&row.continent),
            cell
        )
        .map_err(wrap)?;
    }
    info!(
        "exported {} rows to '{}' at {}",
        view.rows.len(),
        path.display(),
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}
