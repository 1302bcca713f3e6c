//! # health-trends
//!
//! Headless driver for the indicator pipeline: loads a table, applies the
//! filter flags and prints the requested view as JSON on stdout.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;

use health_trends::aggregate::{self, Statistic};
use health_trends::category::CategoryTable;
use health_trends::data::filter::{self, FilterCriteria, SortOrder};
use health_trends::data::loader::load_dataset;
use health_trends::data::model::{DatasetOverview, HealthDataset};
use health_trends::forecast::{forecast_indicators, ForecastConfig};

#[derive(Parser)]
#[command(name = "health-trends")]
#[command(about = "Filter, summarise and forecast health indicator tables", long_about = None)]
struct Cli {
    /// Indicator table (.csv, .json or .parquet)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Category table as JSON (defaults to the builtin health categories)
    #[arg(short, long)]
    categories: Option<PathBuf>,

    /// Keep indicators that no category claims
    #[arg(long)]
    keep_other: bool,

    #[command(flatten)]
    filters: FilterArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FilterArgs {
    /// First year (inclusive)
    #[arg(long)]
    from: Option<i32>,

    /// Last year (inclusive)
    #[arg(long)]
    to: Option<i32>,

    /// Case-insensitive substring of the indicator name
    #[arg(short, long)]
    keyword: Option<String>,

    /// Restrict to a category (repeatable)
    #[arg(long = "category")]
    category: Vec<String>,

    /// Restrict to an indicator (repeatable)
    #[arg(long = "indicator")]
    indicator: Vec<String>,

    /// Newest years first
    #[arg(long)]
    descending: bool,
}

impl FilterArgs {
    fn criteria(&self, dataset: &HealthDataset) -> FilterCriteria {
        let mut criteria = FilterCriteria::spanning(dataset)
            .with_categories(self.category.iter().cloned())
            .with_indicators(self.indicator.iter().cloned());
        if let Some(from) = self.from {
            criteria.years.min = from;
        }
        if let Some(to) = self.to {
            criteria.years.max = to;
        }
        if let Some(keyword) = &self.keyword {
            criteria = criteria.with_keyword(keyword.clone());
        }
        if self.descending {
            criteria = criteria.with_sort(SortOrder::Descending);
        }
        criteria
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum GroupBy {
    /// Mean per category, year and indicator
    CategoryYear,
    /// Mean per indicator and year
    IndicatorYear,
    /// Statistic per category and year
    Category,
}

#[derive(Subcommand)]
enum Commands {
    /// Headline figures of the selection
    Overview,

    /// The selected records
    Filter {
        /// Print at most this many records
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Grouped statistics of the selection
    Aggregate {
        #[arg(long, value_enum, default_value_t = GroupBy::CategoryYear)]
        by: GroupBy,

        /// Sum instead of mean (only with `--by category`)
        #[arg(long)]
        sum: bool,
    },

    /// Forecast every selected indicator
    Forecast {
        /// Years to project
        #[arg(long, default_value_t = 5)]
        horizon: usize,

        /// Time budget of one primary fit, in milliseconds
        #[arg(long, default_value_t = 250)]
        budget_ms: u64,
    },

    /// List the category table
    Categories,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let table = match &cli.categories {
        Some(path) => CategoryTable::from_json_file(path)
            .with_context(|| format!("loading categories from {}", path.display()))?,
        None => CategoryTable::builtin(),
    };

    if let Commands::Categories = cli.command {
        return print_json(&table.categories());
    }

    let data = cli
        .data
        .as_deref()
        .context("--data is required for this command")?;
    let dataset = load_dataset(data, &table, cli.keep_other)?;
    let criteria = cli.filters.criteria(&dataset);
    let selected = filter::apply(&dataset.records, &criteria);
    log::info!(
        "{} of {} records selected ({} indicators)",
        selected.len(),
        dataset.len(),
        dataset.indicators.len()
    );

    match cli.command {
        Commands::Overview => print_json(&DatasetOverview::of(&selected)),
        Commands::Filter { limit } => {
            let n = limit.unwrap_or(selected.len()).min(selected.len());
            print_json(&selected[..n])
        }
        Commands::Aggregate { by, sum } => match by {
            GroupBy::CategoryYear => print_json(&aggregate::by_category_year(&selected)),
            GroupBy::IndicatorYear => print_json(&aggregate::by_indicator_year(&selected)),
            GroupBy::Category => {
                let statistic = if sum { Statistic::Sum } else { Statistic::Mean };
                print_json(&aggregate::summarize_categories(&selected, statistic))
            }
        },
        Commands::Forecast { horizon, budget_ms } => {
            let config = ForecastConfig::default()
                .with_horizon(horizon)
                .with_time_budget(std::time::Duration::from_millis(budget_ms));
            config.validate()?;

            let indicators: Vec<String> = if criteria.indicators.is_empty() {
                HealthDataset::from_records(selected.clone())
                    .indicators
                    .into_iter()
                    .collect()
            } else {
                criteria.indicators.iter().cloned().collect()
            };

            let out: Vec<serde_json::Value> = forecast_indicators(&selected, &indicators, &config)
                .into_iter()
                .map(|f| match f.outcome {
                    Ok(outcome) => json!({ "indicator": f.indicator, "forecast": outcome }),
                    Err(e) => json!({ "indicator": f.indicator, "error": e.to_string() }),
                })
                .collect();
            print_json(&out)
        }
        Commands::Categories => Ok(()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value).context("writing JSON")?;
    writeln!(out)?;
    Ok(())
}
