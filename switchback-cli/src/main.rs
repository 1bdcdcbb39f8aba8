//! Switchback CLI — list, describe, and execute strategies.
//!
//! `run` builds a market-data manager from the `SWITCHBACK_TIINGO_TOKEN`
//! environment variable, executes the named strategy over the requested
//! window, and prints the performance bundle as JSON.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::collections::HashMap;

use switchback_core::data::Manager;
use switchback_core::strategy::{self, Params};

#[derive(Parser)]
#[command(name = "switchback", about = "Quantitative portfolio backtesting engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered strategies
    Strategies,
    /// Print the full descriptor for one strategy as JSON
    Describe { shortcode: String },
    /// Execute a strategy and print its performance bundle as JSON
    Run {
        shortcode: String,
        /// JSON object of strategy parameter values
        #[arg(long, default_value = "{}")]
        params: String,
        /// Inclusive start of the backtest window (YYYY-MM-DD)
        #[arg(long)]
        begin: Option<NaiveDate>,
        /// Inclusive end of the backtest window (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Strategies => {
            for info in strategy::list_strategies() {
                println!("{:<8} {:<32} {}", info.shortcode, info.name, info.description);
            }
        }
        Command::Describe { shortcode } => {
            let descriptor = strategy::get_strategy(&shortcode)?;
            println!("{}", serde_json::to_string_pretty(&descriptor.info)?);
        }
        Command::Run { shortcode, params, begin, end } => {
            let token = std::env::var("SWITCHBACK_TIINGO_TOKEN")
                .context("SWITCHBACK_TIINGO_TOKEN is not set")?;
            let params: Params =
                serde_json::from_str(&params).context("--params must be a JSON object")?;

            let descriptor = strategy::get_strategy(&shortcode)?;
            let mut instance = (descriptor.factory)(&params)?;

            let credentials = HashMap::from([("tiingo".to_string(), token)]);
            let mut manager = Manager::new(&credentials);
            manager.begin = begin;
            manager.end = end;

            let portfolio = instance.compute(&mut manager)?;
            let through = manager.end.unwrap_or_else(|| chrono::Utc::now().date_naive());
            let performance = portfolio.calculate_performance(&mut manager, through)?;
            println!("{}", serde_json::to_string_pretty(&performance)?);
        }
    }
    Ok(())
}
