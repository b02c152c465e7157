use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::catalog::{Catalog, IndicatorGroup, IndicatorKind, Polarity, ResolvedCatalog};
use crate::dataset::{self, normalize_column, Table};
use crate::error::ExplorerError;
use crate::filter::{FilterSpec, RankDirection, ValueFilter};
use crate::render::{scale_legend, ChartRenderer};
use crate::search::search_countries;
use crate::stats::{Stat, Summary};
use crate::view::{
    build_comparison_view, build_map_view, build_metrics_view, build_rank_view, export_csv,
    CompareBy, CompareSelection, MapView, MetricsScope, RankedRow,
};

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Arguments shared by every command that reads the dataset.
#[derive(Args, Debug)]
pub struct DataArgs {
    /// Path to the dataset spreadsheet (CSV)
    #[arg(short, long, default_value = "final_data.csv")]
    pub data: PathBuf,

    /// Optional YAML file overriding the built-in indicator catalog
    #[arg(long)]
    pub catalog: Option<PathBuf>,
}

impl DataArgs {
    /// Load the table and resolve the catalog against it, with a spinner
    /// while the file is read.
    fn load(&self) -> Result<(Table, ResolvedCatalog)> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}").unwrap());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message(format!("Loading {}...", self.data.display()));

        let table = dataset::load_table(&self.data)?;
        let catalog = Catalog::load(self.catalog.as_deref())?;
        let resolved = catalog.resolve(&table);

        spinner.finish_and_clear();
        Ok((table, resolved))
    }
}

/// Normalize a continent selection: explicit names are title-cased, an
/// empty selection means every continent in the table.
fn continent_selection(table: &Table, continents: &[String]) -> BTreeSet<String> {
    if continents.is_empty() {
        table.continents().into_iter().collect()
    } else {
        continents.iter().map(|c| normalize_column(c)).collect()
    }
}

fn summary_line(summary: &Summary) -> String {
    let std = summary
        .std
        .map(|s| format!("{:.2}", s))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "Average: {:.2} | Median: {:.2} | Std Dev: {} | Min: {:.2} | Max: {:.2} | Rows: {}",
        summary.mean, summary.median, std, summary.min, summary.max, summary.count
    )
}

const NO_DATA: &str = "No data matches your selected filters. Please adjust your criteria.";

#[derive(Args)]
pub struct MapCommand {
    #[command(flatten)]
    pub data: DataArgs,

    /// Indicator to display (e.g. "Purchasing Power")
    #[arg(short, long)]
    pub indicator: String,

    /// Continents to include, comma separated (defaults to all)
    #[arg(short, long, value_delimiter = ',')]
    pub continents: Vec<String>,

    /// Inclusive value range filter
    #[arg(long, num_args = 2, value_names = ["LOW", "HIGH"])]
    pub range: Option<Vec<f64>>,

    /// Category labels to include, comma separated
    #[arg(long, value_delimiter = ',')]
    pub categories: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Write the filtered table (country, continent, indicator) to a CSV file
    #[arg(long)]
    pub export: Option<PathBuf>,
}

impl MapCommand {
    pub fn execute(self) -> Result<()> {
        let (table, catalog) = self.data.load()?;

        let values = if let Some(range) = &self.range {
            ValueFilter::Range { low: range[0], high: range[1] }
        } else if !self.categories.is_empty() {
            ValueFilter::Categories {
                labels: self.categories.iter().map(|c| c.trim().to_string()).collect(),
            }
        } else {
            ValueFilter::Any
        };
        let spec = FilterSpec::new(continent_selection(&table, &self.continents), values);

        let view = match build_map_view(&table, &catalog, &self.indicator, &spec) {
            Ok(view) => view,
            Err(ExplorerError::EmptyRange { column }) => {
                println!("No data available for '{}' in this dataset.", column);
                return Ok(());
            }
            Err(ExplorerError::EmptySelection { what }) => {
                println!("No {} selected; no rows match.", what);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if let OutputFormat::Json = self.format {
            println!("{}", serde_json::to_string_pretty(&view)?);
        } else {
            self.print_table_view(&view)?;
        }

        if let Some(path) = &self.export {
            export_csv(path, &view)?;
            println!("\nExported {} rows to {}", view.rows.len(), path.display());
        }
        Ok(())
    }

    fn print_table_view(&self, view: &MapView) -> Result<()> {
        println!("\nWorld view of {}", view.column);
        println!("{}", scale_legend(&view.scale));

        if view.is_empty() {
            println!("\n{}", NO_DATA);
            return Ok(());
        }

        if let Some(summary) = &view.summary {
            println!();
            match &view.extremes {
                Some(ext) => println!(
                    "Average: {:.2} | Median: {:.2} | Std Dev: {} | Min ({}): {:.2} | Max ({}): {:.2}",
                    summary.mean,
                    summary.median,
                    summary.std.map(|s| format!("{:.2}", s)).unwrap_or_else(|| "n/a".to_string()),
                    ext.min_country,
                    ext.min_value,
                    ext.max_country,
                    ext.max_value,
                ),
                None => println!("{}", summary_line(summary)),
            }
            if let Some(robust) = &view.robust_range {
                println!("Color range (5th-95th percentile): {:.2} to {:.2}", robust.min, robust.max);
            }
            if view.log_scale_recommended {
                println!("Tip: this indicator spans more than a decade; a log scale reads better.");
            }
        }

        if let Some(dist) = &view.category_distribution {
            if !dist.is_empty() {
                let entries: Vec<(String, f64)> = dist
                    .iter()
                    .map(|c| (format!("{} ({} countries)", c.label, c.count), c.percentage))
                    .collect();
                let renderer = ChartRenderer::new();
                let (w, h) = renderer.optimal_dimensions();
                println!();
                println!(
                    "{}",
                    renderer.bar_chart(
                        &format!("Distribution of {} categories (%)", view.indicator),
                        &entries,
                        Some(w),
                        Some(h / 2),
                    )
                );
            }
        }

        // Data table, better end first.
        let mut rows = view.rows.clone();
        let ascending = view.polarity == Polarity::LowerIsBetter;
        if view.kind == IndicatorKind::Continuous {
            rows.sort_by(|a, b| {
                let a = a.value.unwrap_or(f64::NEG_INFINITY);
                let b = b.value.unwrap_or(f64::NEG_INFINITY);
                if ascending { a.total_cmp(&b) } else { b.total_cmp(&a) }
            });
        }
        println!("\n{:<24} {:<12} {:>12} {:>12}", "Country", "Continent", "Value", "Category");
        println!("{:-<64}", "");
        for row in &rows {
            let value = row
                .value
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| "-".to_string());
            let category = row.category.as_deref().unwrap_or("-");
            println!("{:<24} {:<12} {:>12} {:>12}", row.country, row.continent, value, category);
        }
        println!("\nNumber of countries displayed: {}", rows.len());
        Ok(())
    }
}

#[derive(Args)]
pub struct MetricsCommand {
    #[command(flatten)]
    pub data: DataArgs,

    /// Indicator to aggregate
    #[arg(short, long)]
    pub indicator: String,

    /// Continents for the global view, comma separated (defaults to all)
    #[arg(short, long, value_delimiter = ',')]
    pub continents: Vec<String>,

    /// Focus on one continent and show country-level values instead
    #[arg(long, conflicts_with = "continents")]
    pub continent: Option<String>,

    /// Statistic to compute per group
    #[arg(short, long, value_enum, default_value = "mean")]
    pub stat: Stat,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl MetricsCommand {
    pub fn execute(self) -> Result<()> {
        let (table, catalog) = self.data.load()?;

        let scope = match &self.continent {
            Some(name) => MetricsScope::SingleContinent(name.clone()),
            None => MetricsScope::Global {
                continents: continent_selection(&table, &self.continents),
            },
        };

        let view = match build_metrics_view(&table, &catalog, &self.indicator, &scope, self.stat) {
            Ok(view) => view,
            Err(ExplorerError::EmptySelection { what }) => {
                println!("No {} selected; no rows match.", what);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if let OutputFormat::Json = self.format {
            println!("{}", serde_json::to_string_pretty(&view)?);
            return Ok(());
        }

        println!("\nStatistics for {} ({} per {})", view.column, view.stat, view.level.to_lowercase());
        println!("{}", scale_legend(&view.scale));

        if view.is_empty() {
            println!("\n{}", NO_DATA);
            return Ok(());
        }
        if let Some(summary) = &view.summary {
            println!("\n{}", summary_line(summary));
        }

        let entries: Vec<(String, f64)> = view
            .groups
            .iter()
            .map(|g| (g.name.clone(), g.value))
            .collect();
        let renderer = ChartRenderer::new();
        let (w, h) = renderer.optimal_dimensions();
        println!();
        println!(
            "{}",
            renderer.bar_chart(
                &format!("{} of {} per {}", view.stat, view.column, view.level.to_lowercase()),
                &entries,
                Some(w),
                Some(h),
            )
        );
        Ok(())
    }
}

#[derive(Args)]
pub struct CompareCommand {
    #[command(flatten)]
    pub data: DataArgs,

    /// Compare two countries or two continents
    #[arg(long, value_enum, default_value = "countries")]
    pub by: CompareBy,

    /// First entity
    #[arg(long)]
    pub first: String,

    /// Second entity
    #[arg(long)]
    pub second: String,

    /// Compare a single indicator (defaults to all numeric indicators)
    #[arg(short, long)]
    pub indicator: Option<String>,

    /// Restrict the comparison to one indicator group
    #[arg(short, long, value_enum, conflicts_with = "indicator")]
    pub group: Option<IndicatorGroup>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl CompareCommand {
    pub fn execute(self) -> Result<()> {
        let (table, catalog) = self.data.load()?;

        let selection = match (&self.indicator, self.group) {
            (Some(name), _) => CompareSelection::One(name.clone()),
            (None, Some(group)) => CompareSelection::Group(group),
            (None, None) => CompareSelection::All,
        };

        let view = build_comparison_view(&table, &catalog, self.by, &self.first, &self.second, &selection)?;

        if let OutputFormat::Json = self.format {
            println!("{}", serde_json::to_string_pretty(&view)?);
            return Ok(());
        }

        println!("\nComparing {} {} and {}", view.by, view.first, view.second);
        println!("\n{:<32} {:>12} {:>12}", "Indicator", &view.first, &view.second);
        println!("{:-<60}", "");
        for pair in &view.rows {
            let fmt = |v: Option<f64>| v.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string());
            println!("{:<32} {:>12} {:>12}", pair.indicator, fmt(pair.first), fmt(pair.second));
        }

        if let Some(pair) = view.single() {
            match (view.leader(), view.difference()) {
                (Some(leader), Some(diff)) => println!(
                    "\n{} scores {:.2} points higher in {}.",
                    leader, diff, pair.indicator
                ),
                (None, Some(_)) => println!(
                    "\n{} and {} have equal scores for {}.",
                    view.first, view.second, pair.indicator
                ),
                _ => println!("\n{}", NO_DATA),
            }
        } else if !view.rows.is_empty() {
            let renderer = ChartRenderer::new();
            let (w, h) = renderer.optimal_dimensions();
            for (name, side) in [(&view.first, 0usize), (&view.second, 1usize)] {
                let entries: Vec<(String, f64)> = view
                    .rows
                    .iter()
                    .filter_map(|p| {
                        let value = if side == 0 { p.first } else { p.second };
                        value.map(|v| (p.indicator.clone(), v))
                    })
                    .collect();
                println!();
                println!(
                    "{}",
                    renderer.bar_chart(&format!("Indicator values for {}", name), &entries, Some(w), Some(h / 2))
                );
            }
        }
        Ok(())
    }
}

#[derive(Args)]
pub struct RankCommand {
    #[command(flatten)]
    pub data: DataArgs,

    /// Indicator to rank by
    #[arg(short, long)]
    pub indicator: String,

    /// Number of countries to show (at least 1)
    #[arg(short = 'n', long, default_value = "5", value_parser = clap::value_parser!(u32).range(1..))]
    pub count: u32,

    /// Which end of the ranking to show
    #[arg(long, value_enum, default_value = "top")]
    pub direction: RankDirection,

    /// Show top and bottom side by side
    #[arg(long)]
    pub versus: bool,

    /// Restrict the ranking to one continent
    #[arg(long)]
    pub continent: Option<String>,

    /// Inclusive value range filter
    #[arg(long, num_args = 2, value_names = ["LOW", "HIGH"])]
    pub range: Option<Vec<f64>>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl RankCommand {
    pub fn execute(self) -> Result<()> {
        let (table, catalog) = self.data.load()?;

        let continents = match &self.continent {
            Some(name) => [normalize_column(name)].into_iter().collect(),
            None => continent_selection(&table, &[]),
        };
        let values = match &self.range {
            Some(range) => ValueFilter::Range { low: range[0], high: range[1] },
            None => ValueFilter::Any,
        };
        let spec = FilterSpec::new(continents, values);

        let view = build_rank_view(
            &table,
            &catalog,
            &self.indicator,
            &spec,
            self.count as usize,
            self.direction,
            self.versus,
        )?;

        if let OutputFormat::Json = self.format {
            println!("{}", serde_json::to_string_pretty(&view)?);
            return Ok(());
        }

        if view.is_empty() {
            println!("\n{}", NO_DATA);
            return Ok(());
        }

        println!("\n{} {} countries by {}", view.direction, view.requested, view.column);
        println!("{}", scale_legend(&view.scale));
        print_ranked(&view.rows);

        let renderer = ChartRenderer::new();
        let (w, h) = renderer.optimal_dimensions();
        let entries: Vec<(String, f64)> = view
            .rows
            .iter()
            .map(|r| (r.country.clone(), r.value))
            .collect();
        println!();
        println!(
            "{}",
            renderer.scatter_chart(
                &format!("{} {}: {}", view.direction, view.requested, view.column),
                &entries,
                Some(w),
                Some(h),
            )
        );

        if let Some(opposite) = &view.opposite {
            let other = match view.direction {
                RankDirection::Top => RankDirection::Bottom,
                RankDirection::Bottom => RankDirection::Top,
            };
            println!("\n{} {} countries by {}", other, view.requested, view.column);
            print_ranked(opposite);

            let combined: Vec<(String, f64)> = view
                .rows
                .iter()
                .chain(opposite.iter())
                .map(|r| (r.country.clone(), r.value))
                .collect();
            println!();
            println!(
                "{}",
                renderer.bar_chart(
                    &format!("Top vs bottom: {}", view.column),
                    &combined,
                    Some(w),
                    Some(h),
                )
            );
        }
        Ok(())
    }
}

fn print_ranked(rows: &[RankedRow]) {
    println!("\n{:<6} {:<24} {:<12} {:>12}", "Rank", "Country", "Continent", "Value");
    println!("{:-<56}", "");
    for row in rows {
        println!(
            "{:<6} {:<24} {:<12} {:>12.2}",
            row.rank, row.country, row.continent, row.value
        );
    }
}

#[derive(Args)]
pub struct SearchCommand {
    #[command(flatten)]
    pub data: DataArgs,

    /// Search term (fuzzy match over country and continent names)
    pub query: String,

    /// Maximum number of results
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl SearchCommand {
    pub fn execute(self) -> Result<()> {
        let (table, _) = self.data.load()?;
        info!("searching for '{}'", self.query);

        let matches = search_countries(&table, &self.query, self.limit);
        if let OutputFormat::Json = self.format {
            println!("{}", serde_json::to_string_pretty(&matches)?);
            return Ok(());
        }

        if matches.is_empty() {
            println!("No countries match '{}'.", self.query);
            return Ok(());
        }
        println!("\n{:<24} {:<12} {:>8}  {}", "Country", "Continent", "Score", "Matched on");
        println!("{:-<56}", "");
        for m in &matches {
            println!("{:<24} {:<12} {:>8}  {}", m.country, m.continent, m.score, m.matched_on);
        }
        Ok(())
    }
}

#[derive(Args)]
pub struct CatalogCommand {
    #[command(flatten)]
    pub data: DataArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl CatalogCommand {
    pub fn execute(self) -> Result<()> {
        let (table, catalog) = self.data.load()?;

        if let OutputFormat::Json = self.format {
            println!("{}", serde_json::to_string_pretty(catalog.indicators())?);
            return Ok(());
        }

        let continents = table.continents();
        println!(
            "\nDataset: {} countries across {} continents",
            table.len(),
            continents.len()
        );
        println!("Continents: {}", continents.join(", "));
        for group in [IndicatorGroup::Economic, IndicatorGroup::Lifestyle, IndicatorGroup::Environment] {
            let members = catalog.in_group(group);
            if members.is_empty() {
                continue;
            }
            println!("\n{} indicators", group);
            println!("{:-<60}", "");
            for indicator in members {
                let kind = match indicator.kind() {
                    IndicatorKind::Continuous => "continuous",
                    IndicatorKind::Categorical => "categorical",
                };
                println!("• {} ({}, {})", indicator.name(), kind, indicator.polarity());
                if let Some(note) = &indicator.def.note {
                    println!("    {}", note);
                }
                if let Some(description) = &indicator.def.description {
                    println!("    {}", description);
                }
            }
        }
        Ok(())
    }
}
