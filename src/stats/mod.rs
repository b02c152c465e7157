use std::collections::BTreeMap;
use std::fmt;

use clap::ValueEnum;
use serde::Serialize;

use crate::dataset::CountryRecord;

/// Statistic to compute over a set of indicator values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    Mean,
    Median,
    Std,
    Min,
    Max,
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stat::Mean => write!(f, "mean"),
            Stat::Median => write!(f, "median"),
            Stat::Std => write!(f, "std"),
            Stat::Min => write!(f, "min"),
            Stat::Max => write!(f, "max"),
        }
    }
}

/// Compute `stat` over `values`. Empty input yields `None`, never zero;
/// std needs at least two values (sample standard deviation, n - 1).
pub fn stat_of(values: &[f64], stat: Stat) -> Option<f64> {
    match stat {
        Stat::Mean => mean(values),
        Stat::Median => median(values),
        Stat::Std => sample_std(values),
        Stat::Min => values.iter().copied().reduce(f64::min),
        Stat::Max => values.iter().copied().reduce(f64::max),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Linearly interpolated quantile, `q` in [0, 1]. Matches the robust
/// color-range computation applied to choropleth values.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        Some(sorted[lower])
    } else {
        let frac = pos - lower as f64;
        Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
    }
}

/// The five summary statistics shown in every metrics row.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
}

impl Summary {
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        Some(Summary {
            count: values.len(),
            mean: mean(values)?,
            median: median(values)?,
            std: sample_std(values),
            min: stat_of(values, Stat::Min)?,
            max: stat_of(values, Stat::Max)?,
        })
    }
}

/// The rows holding the smallest and largest value of an indicator.
/// Ties keep the first row in table order.
#[derive(Debug, Clone, Serialize)]
pub struct Extremes {
    pub min_country: String,
    pub min_value: f64,
    pub max_country: String,
    pub max_value: f64,
}

pub fn extremes(rows: &[&CountryRecord], column: &str) -> Option<Extremes> {
    let mut min: Option<(&CountryRecord, f64)> = None;
    let mut max: Option<(&CountryRecord, f64)> = None;
    for row in rows {
        let Some(value) = row.value(column) else {
            continue;
        };
        if min.map_or(true, |(_, m)| value < m) {
            min = Some((row, value));
        }
        if max.map_or(true, |(_, m)| value > m) {
            max = Some((row, value));
        }
    }
    let ((min_row, min_value), (max_row, max_value)) = (min?, max?);
    Some(Extremes {
        min_country: min_row.country.clone(),
        min_value,
        max_country: max_row.country.clone(),
        max_value,
    })
}

/// Grouping dimension for aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupField {
    Continent,
    Country,
}

impl GroupField {
    fn key_of<'a>(&self, record: &'a CountryRecord) -> &'a str {
        match self {
            GroupField::Continent => &record.continent,
            GroupField::Country => &record.country,
        }
    }
}

impl fmt::Display for GroupField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupField::Continent => write!(f, "Continent"),
            GroupField::Country => write!(f, "Country"),
        }
    }
}

/// One group's aggregates: the group-key values in field order, and one
/// (possibly null) aggregate per requested column. Ephemeral; recomputed
/// from the table on every call, never cached.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateRow {
    pub keys: Vec<String>,
    pub values: BTreeMap<String, Option<f64>>,
}

impl AggregateRow {
    pub fn value(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied().flatten()
    }

    pub fn key_string(&self) -> String {
        self.keys.join(" / ")
    }
}

/// Group `rows` by the Cartesian combination of `fields` and compute
/// `stat` for each column within each group, skipping nulls. A group
/// where a column is entirely null gets a null aggregate for it, not
/// zero. Groups come back in key order; callers needing another order
/// sort themselves.
pub fn aggregate(
    rows: &[&CountryRecord],
    fields: &[GroupField],
    columns: &[String],
    stat: Stat,
) -> Vec<AggregateRow> {
    let mut groups: BTreeMap<Vec<String>, Vec<&CountryRecord>> = BTreeMap::new();
    for row in rows {
        let key: Vec<String> = fields.iter().map(|f| f.key_of(row).to_string()).collect();
        groups.entry(key).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|(keys, members)| {
            let mut values = BTreeMap::new();
            for column in columns {
                let observed: Vec<f64> =
                    members.iter().filter_map(|r| r.value(column)).collect();
                values.insert(column.clone(), stat_of(&observed, stat));
            }
            AggregateRow { keys, values }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Table;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn basic_statistics() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!(close(stat_of(&values, Stat::Mean).unwrap(), 2.5));
        assert!(close(stat_of(&values, Stat::Median).unwrap(), 2.5));
        assert!(close(stat_of(&values, Stat::Min).unwrap(), 1.0));
        assert!(close(stat_of(&values, Stat::Max).unwrap(), 4.0));
        // Sample std: variance 5/3.
        assert!(close(stat_of(&values, Stat::Std).unwrap(), (5.0f64 / 3.0).sqrt()));

        assert!(close(stat_of(&[1.0, 5.0, 2.0], Stat::Median).unwrap(), 2.0));
    }

    #[test]
    fn empty_and_singleton_inputs_yield_null_not_zero() {
        assert_eq!(stat_of(&[], Stat::Mean), None);
        assert_eq!(stat_of(&[], Stat::Min), None);
        assert_eq!(stat_of(&[42.0], Stat::Std), None);
        assert!(Summary::of(&[]).is_none());

        let summary = Summary::of(&[42.0]).unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.std, None);
    }

    #[test]
    fn quantiles_interpolate_linearly() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!(close(quantile(&values, 0.0).unwrap(), 1.0));
        assert!(close(quantile(&values, 1.0).unwrap(), 4.0));
        assert!(close(quantile(&values, 0.5).unwrap(), 2.5));
        assert!(close(quantile(&values, 0.05).unwrap(), 1.15));
        assert_eq!(quantile(&[], 0.5), None);
    }

    fn sample_table() -> Table {
        Table::from_records(vec![
            CountryRecord::new("Luxembourg", "Europe").with_value("Purchasing Power Value", 195.55),
            CountryRecord::new("Finland", "Europe").with_value("Purchasing Power Value", 110.05),
            CountryRecord::new("Uganda", "Africa").with_value("Purchasing Power Value", 10.33),
            // Nigeria has no purchasing-power value at all.
            CountryRecord::new("Nigeria", "Africa").with_value("Safety Value", 33.0),
            CountryRecord::new("Australia", "Oceania"),
        ])
    }

    #[test]
    fn aggregates_by_continent_skipping_nulls() {
        let table = sample_table();
        let rows = table.rows();
        let columns = vec!["Purchasing Power Value".to_string()];
        let agg = aggregate(&rows, &[GroupField::Continent], &columns, Stat::Mean);

        assert_eq!(agg.len(), 3);
        let africa = &agg[0];
        assert_eq!(africa.keys, ["Africa"]);
        // Nigeria's null is skipped, not averaged in as zero.
        assert!(close(africa.value("Purchasing Power Value").unwrap(), 10.33));

        let europe = &agg[1];
        assert!(close(europe.value("Purchasing Power Value").unwrap(), (195.55 + 110.05) / 2.0));

        // Oceania has no values for this column: null aggregate, not zero.
        let oceania = &agg[2];
        assert_eq!(oceania.keys, ["Oceania"]);
        assert_eq!(oceania.value("Purchasing Power Value"), None);
        assert_eq!(oceania.values["Purchasing Power Value"], None);
    }

    #[test]
    fn aggregates_by_continent_and_country() {
        let table = sample_table();
        let rows = table.rows();
        let columns = vec!["Purchasing Power Value".to_string()];
        let agg = aggregate(
            &rows,
            &[GroupField::Continent, GroupField::Country],
            &columns,
            Stat::Mean,
        );
        assert_eq!(agg.len(), 5);
        assert_eq!(agg[0].keys, ["Africa", "Nigeria"]);
        assert_eq!(agg[1].keys, ["Africa", "Uganda"]);
        assert_eq!(agg[1].key_string(), "Africa / Uganda");
    }

    #[test]
    fn aggregation_is_idempotent_over_a_single_group() {
        let table = sample_table();
        let rows = table.rows();
        let columns = vec!["Purchasing Power Value".to_string()];
        let first = aggregate(&rows, &[GroupField::Continent], &columns, Stat::Mean);
        let europe_mean = first[1].value("Purchasing Power Value").unwrap();

        // Re-aggregate the already-aggregated single-group table.
        let reagg_input = Table::from_records(vec![
            CountryRecord::new("Europe", "Europe").with_value("Purchasing Power Value", europe_mean),
        ]);
        let reagg_rows = reagg_input.rows();
        let second = aggregate(&reagg_rows, &[GroupField::Continent], &columns, Stat::Mean);
        assert_eq!(second.len(), 1);
        assert!(close(second[0].value("Purchasing Power Value").unwrap(), europe_mean));
    }

    #[test]
    fn extremes_report_countries_with_first_tie_winning() {
        let table = Table::from_records(vec![
            CountryRecord::new("A", "X").with_value("V", 3.0),
            CountryRecord::new("B", "X").with_value("V", 1.0),
            CountryRecord::new("C", "X").with_value("V", 3.0),
            CountryRecord::new("D", "X"),
        ]);
        let rows = table.rows();
        let ext = extremes(&rows, "V").unwrap();
        assert_eq!(ext.min_country, "B");
        assert_eq!(ext.max_country, "A");
        assert!(close(ext.max_value, 3.0));

        assert!(extremes(&rows, "Missing").is_none());
    }
}
