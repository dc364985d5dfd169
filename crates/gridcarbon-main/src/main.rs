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

mod cli;
mod config;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use gridcarbon_pipeline::{
    Pipeline, PipelineOptions, RunReport, Stage, StageReport, TableNaming,
};
use gridcarbon_sources::{EntsoeClient, WeatherApiClient};
use gridcarbon_store::SqliteStore;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::cli::{BackfillArgs, Cli, Commands, RunArgs};
use crate::config::{AppConfig, validate_table_suffix};

type LivePipeline = Pipeline<EntsoeClient, WeatherApiClient, SqliteStore>;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // API keys may also come from a .env file in the working directory.
    let _ = dotenvy::dotenv();

    // Respects RUST_LOG environment variable
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Run(args) => run(&config, args),
        Commands::Backfill(args) => backfill(&config, args),
        Commands::Regions => {
            for region in config.regions() {
                println!(
                    "{:<4} {:<24} {:<16} {}",
                    region.code, region.name, region.city, region.timezone
                );
            }
            Ok(())
        }
    }
}

fn build_pipeline(config: &AppConfig, options: PipelineOptions) -> Result<LivePipeline> {
    let api = &config.api;
    let grid = EntsoeClient::from_config(
        api.entsoe_base_url.clone(),
        api.entsoe_api_key.clone(),
        api.timeout(),
    )
    .context("Failed to create ENTSO-E client")?;
    let weather = WeatherApiClient::from_config(
        api.weatherapi_base_url.clone(),
        api.weatherapi_key.clone(),
        api.timeout(),
    )
    .context("Failed to create WeatherAPI client")?;
    let store = SqliteStore::open(&config.store.path)
        .with_context(|| format!("Failed to open store at {}", config.store.path))?;

    info!("Store: {} (dedupe: {:?})", config.store.path, options.dedupe);
    Ok(Pipeline::new(grid, weather, store, options))
}

fn run(config: &AppConfig, args: RunArgs) -> Result<()> {
    let regions = config.select_regions(&args.regions)?;
    let stages = if args.stages.is_empty() {
        Stage::ALL.to_vec()
    } else {
        args.stages
    };
    let pipeline = build_pipeline(config, config.pipeline_options(None)?)?;

    let now = Utc::now();
    let reports: Vec<RunReport> = regions
        .iter()
        .map(|region| pipeline.run(region, now, &stages))
        .collect();
    summarize(&reports)
}

fn backfill(config: &AppConfig, args: BackfillArgs) -> Result<()> {
    if args.start > args.end {
        bail!("--start {} is after --end {}", args.start, args.end);
    }
    validate_table_suffix(&args.suffix).context("Invalid --suffix")?;
    let regions = config.select_regions(&args.regions)?;
    let stages = if args.stages.is_empty() {
        Stage::HISTORICAL.to_vec()
    } else {
        args.stages
    };
    let options = config.pipeline_options(Some(TableNaming::new(args.suffix)))?;
    let pipeline = build_pipeline(config, options)?;

    let reports: Vec<RunReport> = regions
        .iter()
        .map(|region| pipeline.backfill(region, args.start, args.end, &stages))
        .collect();
    summarize(&reports)
}

/// Stage failures are already logged; a run only fails as a whole when no
/// region got anything done.
fn summarize(reports: &[RunReport]) -> Result<()> {
    let written: usize = reports.iter().map(RunReport::rows_written).sum();
    let failed: Vec<&RunReport> = reports.iter().filter(|r| !r.is_success()).collect();

    info!(
        "Finished {} region(s): {} row(s) written, {} with failed stages",
        reports.len(),
        written,
        failed.len()
    );
    for report in &failed {
        let stages: Vec<&str> = report.failed_stages().map(Stage::name).collect();
        warn!("   {}: {}", report.region, stages.join(", "));
    }

    let mut stages = reports.iter().flat_map(|r| &r.stages).peekable();
    if stages.peek().is_some() && stages.all(StageReport::is_failed) {
        bail!("every stage of every region failed");
    }
    Ok(())
}
