use std::collections::BTreeSet;
use std::fmt;

use clap::ValueEnum;
use serde::Serialize;

use crate::catalog::ResolvedIndicator;
use crate::dataset::{CountryRecord, Table};
use crate::error::ExplorerError;

/// Which end of the ranking to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RankDirection {
    Top,
    Bottom,
}

impl fmt::Display for RankDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankDirection::Top => write!(f, "top"),
            RankDirection::Bottom => write!(f, "bottom"),
        }
    }
}

/// Value predicate applied to the selected indicator.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueFilter {
    /// No value constraint; rows null in the indicator are still dropped
    /// (the indicator does not apply to them).
    Any,
    /// Inclusive numeric bounds.
    Range { low: f64, high: f64 },
    /// Categorical label membership.
    Categories { labels: BTreeSet<String> },
}

/// An immutable snapshot of the user's selection. Every derivation takes
/// one of these plus the static table; nothing is carried between calls.
#[derive(Debug, Clone, Serialize)]
pub struct FilterSpec {
    pub continents: BTreeSet<String>,
    pub values: ValueFilter,
}

impl FilterSpec {
    pub fn new(continents: BTreeSet<String>, values: ValueFilter) -> Self {
        Self { continents, values }
    }

    /// Check the selection invariants: at least one continent, at least
    /// one category when filtering by category, low <= high. An emptied
    /// selection is reported, never silently replaced with a default.
    pub fn validate(&self) -> Result<(), ExplorerError> {
        if self.continents.is_empty() {
            return Err(ExplorerError::EmptySelection { what: "continents" });
        }
        match &self.values {
            ValueFilter::Range { low, high } if low > high => {
                Err(ExplorerError::InvalidRange { low: *low, high: *high })
            }
            ValueFilter::Categories { labels } if labels.is_empty() => {
                Err(ExplorerError::EmptySelection { what: "categories" })
            }
            _ => Ok(()),
        }
    }
}

/// Rows whose continent is selected and whose indicator value satisfies
/// the predicate. Rows null in the filtered indicator are excluded. The
/// result may legitimately be empty; that is a reportable state, not an
/// error.
pub fn filter<'a>(
    table: &'a Table,
    indicator: &ResolvedIndicator,
    spec: &FilterSpec,
) -> Result<Vec<&'a CountryRecord>, ExplorerError> {
    spec.validate()?;

    let rows = table
        .records()
        .iter()
        .filter(|r| spec.continents.contains(&r.continent));

    let selected: Vec<&CountryRecord> = match &spec.values {
        ValueFilter::Any => {
            // Drop rows where the indicator has neither a value nor a label.
            rows.filter(|r| {
                let has_value = indicator
                    .value_column
                    .as_deref()
                    .and_then(|c| r.value(c))
                    .is_some();
                let has_label = indicator
                    .category_column
                    .as_deref()
                    .and_then(|c| r.label(c))
                    .is_some();
                has_value || has_label
            })
            .collect()
        }
        ValueFilter::Range { low, high } => {
            let column = indicator.value_column.as_deref().ok_or_else(|| {
                ExplorerError::MissingIndicatorColumn {
                    indicator: indicator.name().to_string(),
                    expected: "numeric value",
                }
            })?;
            rows.filter(|r| {
                r.value(column)
                    .map(|v| v >= *low && v <= *high)
                    .unwrap_or(false)
            })
            .collect()
        }
        ValueFilter::Categories { labels } => {
            let column = indicator.category_column.as_deref().ok_or_else(|| {
                ExplorerError::MissingIndicatorColumn {
                    indicator: indicator.name().to_string(),
                    expected: "category",
                }
            })?;
            rows.filter(|r| r.label(column).map(|l| labels.contains(l)).unwrap_or(false))
                .collect()
        }
    };

    Ok(selected)
}

/// The observed min/max of an indicator column, e.g. for slider bounds
/// and color ranges.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    /// Span ratio large enough that a log scale reads better. Matches the
    /// dashboard's rule: positive values spanning more than one decade.
    pub fn log_scale_recommended(&self) -> bool {
        self.min > 0.0 && self.max / self.min > 10.0
    }
}

/// Min and max over non-null values of `column`. Fails with
/// [`ExplorerError::EmptyRange`] when no row carries a value, so callers
/// surface a "no data" state instead of a degenerate slider.
pub fn range_of(rows: &[&CountryRecord], column: &str) -> Result<ValueRange, ExplorerError> {
    let mut range: Option<ValueRange> = None;
    for row in rows {
        let Some(value) = row.value(column) else {
            continue;
        };
        range = Some(match range {
            None => ValueRange { min: value, max: value },
            Some(r) => ValueRange {
                min: r.min.min(value),
                max: r.max.max(value),
            },
        });
    }
    range.ok_or_else(|| ExplorerError::EmptyRange {
        column: column.to_string(),
    })
}

/// The `n` rows with the largest (top) or smallest (bottom) value of
/// `column`. Ties keep original row order (stable sort); fewer than `n`
/// non-null rows returns all of them.
pub fn top_n<'a>(
    rows: &[&'a CountryRecord],
    column: &str,
    n: usize,
    direction: RankDirection,
) -> Vec<&'a CountryRecord> {
    let mut ranked: Vec<(&CountryRecord, f64)> = rows
        .iter()
        .filter_map(|r| r.value(column).map(|v| (*r, v)))
        .collect();
    match direction {
        RankDirection::Top => ranked.sort_by(|a, b| b.1.total_cmp(&a.1)),
        RankDirection::Bottom => ranked.sort_by(|a, b| a.1.total_cmp(&b.1)),
    }
    ranked.truncate(n);
    ranked.into_iter().map(|(r, _)| r).collect()
}
