// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of GridCarbon.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! CLI argument definitions using clap.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use gridcarbon_pipeline::{Stage, TableNaming};

#[derive(Parser, Debug)]
#[command(name = "gridcarbon")]
#[command(author, version, about = "Grid carbon intensity estimation and forecasting")]
#[command(
    long_about = "Fetches generation, load, prices and weather per region, derives emissions and\n\
    carbon intensity, forecasts intensity for the next days and stores everything\n\
    without duplicates.\n\
    \nExamples:\n  \
    gridcarbon run                                   # all configured regions, all stages\n  \
    gridcarbon run --region CZ --stage forecast      # one region, one stage\n  \
    gridcarbon backfill --start 2024-01-01 --end 2024-03-31 --region DE"
)]
pub struct Cli {
    /// Path to the TOML configuration
    #[arg(short, long, global = true, default_value = "gridcarbon.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load yesterday and today, forecast the next days
    Run(RunArgs),

    /// Load generation, load and prices for a past date range
    Backfill(BackfillArgs),

    /// Print the regions the configuration resolves to
    Regions,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Region code to run (repeatable, default: all configured regions)
    #[arg(short, long = "region", value_name = "CODE")]
    pub regions: Vec<String>,

    /// Stage to run (repeatable, default: all stages)
    #[arg(
        short,
        long = "stage",
        value_name = "NAME",
        long_help = "One of: generation, load, prices, weather, forecast, windows"
    )]
    pub stages: Vec<Stage>,
}

#[derive(Parser, Debug)]
pub struct BackfillArgs {
    /// First day to load (local time of each region)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start: NaiveDate,

    /// Last day to load, inclusive
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub end: NaiveDate,

    /// Region code to load (repeatable, default: all configured regions)
    #[arg(short, long = "region", value_name = "CODE")]
    pub regions: Vec<String>,

    /// Stage to run (repeatable, default: generation, load and prices)
    #[arg(short, long = "stage", value_name = "NAME")]
    pub stages: Vec<Stage>,

    /// Suffix appended to every table name
    #[arg(long, default_value = TableNaming::HISTORICAL_SUFFIX)]
    pub suffix: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_with_regions_and_stages() {
        let cli = Cli::parse_from([
            "gridcarbon", "run", "--region", "CZ", "-r", "DE", "--stage", "forecast",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.regions, vec!["CZ", "DE"]);
        assert_eq!(args.stages, vec![Stage::Forecast]);
        assert_eq!(cli.config, PathBuf::from("gridcarbon.toml"));
    }

    #[test]
    fn test_backfill_defaults_to_historical_suffix() {
        let cli = Cli::parse_from([
            "gridcarbon",
            "backfill",
            "--start",
            "2024-01-01",
            "--end",
            "2024-01-31",
            "--config",
            "other.toml",
        ]);
        let Commands::Backfill(args) = cli.command else {
            panic!("expected backfill");
        };
        assert_eq!(args.suffix, "_historical");
        assert_eq!(args.start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(cli.config, PathBuf::from("other.toml"));
    }

    #[test]
    fn test_unknown_stage_is_rejected() {
        let result = Cli::try_parse_from(["gridcarbon", "run", "--stage", "emissions"]);
        assert!(result.is_err());
    }
}
