use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::{self, EnvFilter};

mod catalog;
mod cli;
mod color;
mod dataset;
mod error;
mod filter;
mod render;
mod search;
mod stats;
mod view;

use cli::commands::{
    CatalogCommand, CompareCommand, MapCommand, MetricsCommand, RankCommand, SearchCommand,
};

#[derive(Parser)]
#[command(name = "qol-explorer")]
#[command(about = "Explore quality-of-life indicators across countries and continents")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// World-map style view: filter countries and color them by an indicator
    Map(MapCommand),
    /// Grouped statistics across continents, or within one continent
    Metrics(MetricsCommand),
    /// Compare two countries or two continents across indicators
    Compare(CompareCommand),
    /// Rank countries by an indicator (top-N / bottom-N)
    Rank(RankCommand),
    /// Fuzzy-search countries and continents in the dataset
    Search(SearchCommand),
    /// Show the indicator catalog as resolved against the dataset
    Catalog(CatalogCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // The dataset is a few hundred rows; cap Polars so reading one CSV
    // does not spin up a full thread pool.
    let max_polars_threads = std::cmp::min(2, num_cpus::get());
    std::env::set_var("POLARS_MAX_THREADS", max_polars_threads.to_string());

    let base_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(base_level)
        .with_env_filter(EnvFilter::new(format!(
            "qol_explorer={},polars=warn",
            if cli.verbose { "debug" } else { "info" }
        )))
        .init();

    info!("Starting qol-explorer v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Map(cmd) => cmd.execute(),
        Commands::Metrics(cmd) => cmd.execute(),
        Commands::Compare(cmd) => cmd.execute(),
        Commands::Rank(cmd) => cmd.execute(),
        Commands::Search(cmd) => cmd.execute(),
        Commands::Catalog(cmd) => cmd.execute(),
    }
}
