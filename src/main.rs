//! Olist Dashboard - E-commerce order analysis
//!
//! Fetches the datasets, derives product revenue and customer locations, and
//! writes the chart panels plus a JSON summary.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use olist_dashboard::{Dashboard, DashboardConfig, DateSelection, SellMeasure, StateSelection};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "olist_dashboard", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read the CSV files from this directory instead of over HTTP
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Where the chart panels and summary are written
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// First approval date to keep (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last approval date to keep, whole day included (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    #[arg(long, value_enum)]
    sell_measure: Option<SellMeasure>,

    #[arg(long, value_enum)]
    state_selection: Option<StateSelection>,

    /// Draw customers on a blank background
    #[arg(long)]
    no_map: bool,
}

impl Cli {
    fn into_config(self) -> Result<(DashboardConfig, DateSelection)> {
        let mut config = match &self.config {
            Some(path) => DashboardConfig::from_file(path)?,
            None => DashboardConfig::default(),
        };

        if let Some(dir) = self.data_dir {
            config.source.data_dir = Some(dir);
        }
        if let Some(dir) = self.output_dir {
            config.charts.output_dir = dir;
        }
        if let Some(measure) = self.sell_measure {
            config.analysis.sell_measure = measure;
        }
        if let Some(selection) = self.state_selection {
            config.analysis.state_selection = selection;
        }
        if self.no_map {
            config.charts.map_url = None;
        }

        let dates = DateSelection {
            start: self.start,
            end: self.end,
        };
        Ok((config, dates))
    }
}

fn run(cli: Cli) -> Result<()> {
    let (config, dates) = cli.into_config().context("Failed to load configuration")?;
    let report = Dashboard::new(config).run(dates)?;
    info!(
        products = report.revenue.products,
        customers = report.geolocation.plotted_customers,
        filtered_orders = report.filtered_orders,
        "Dashboard complete"
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
