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

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use gridcarbon_core::emissions::DEFAULT_FACTORS_VERSION;
use gridcarbon_core::{EmissionFactors, ForecastConfig, Region, european_regions};
use gridcarbon_pipeline::{PipelineOptions, TableNaming};
use gridcarbon_store::DedupeStrategy;
use serde::Deserialize;
use tracing::info;

/// Longest forecast WeatherAPI.com serves
const MAX_HORIZON_DAYS: u32 = 14;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub emission_factors: EmissionFactorSettings,
    /// Regions to run; the built-in European list when empty
    #[serde(default)]
    pub regions: Vec<Region>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_store_path")]
    pub path: String,
    /// Appended to every table name
    #[serde(default)]
    pub table_suffix: String,
    #[serde(default)]
    pub dedupe: DedupeStrategy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    /// Falls back to `ENTSOE_API_KEY`
    #[serde(default)]
    pub entsoe_api_key: Option<String>,
    /// Falls back to `API_KEY_WEATHERAPI`
    #[serde(default)]
    pub weatherapi_key: Option<String>,
    #[serde(default)]
    pub entsoe_base_url: Option<String>,
    #[serde(default)]
    pub weatherapi_base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmissionFactorSettings {
    #[serde(default = "default_factors_version")]
    pub version: String,
    /// gCO2eq/kWh per category column name, replacing the built-in value
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
}

fn default_store_path() -> String {
    "./data/gridcarbon.db".to_owned()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_factors_version() -> String {
    DEFAULT_FACTORS_VERSION.to_owned()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            table_suffix: String::new(),
            dedupe: DedupeStrategy::default(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            entsoe_api_key: None,
            weatherapi_key: None,
            entsoe_base_url: None,
            weatherapi_base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for EmissionFactorSettings {
    fn default() -> Self {
        Self {
            version: default_factors_version(),
            values: BTreeMap::new(),
        }
    }
}

/// Table suffixes end up in SQL identifiers.
pub fn validate_table_suffix(suffix: &str) -> Result<()> {
    if !suffix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("table suffix '{suffix}' may only contain ASCII letters, digits and '_'");
    }
    Ok(())
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
    }

    /// Read `path`, or use the defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            info!("No config file at {}, using defaults", path.display());
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).with_context(|| "Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.store.path.is_empty() {
            bail!("store.path must be set");
        }
        validate_table_suffix(&self.store.table_suffix).context("Invalid store.table_suffix")?;
        if self.api.timeout_secs == 0 {
            bail!("api.timeout_secs must be positive");
        }
        if self.forecast.training_days == 0 {
            bail!("forecast.training_days must be positive");
        }
        if !(1..=MAX_HORIZON_DAYS).contains(&self.forecast.horizon_days) {
            bail!("forecast.horizon_days must be between 1 and {MAX_HORIZON_DAYS}");
        }
        if self.forecast.features.is_empty() {
            bail!("forecast.features must name at least one column");
        }
        self.forecast
            .boosting
            .validate()
            .context("Invalid [forecast] boosting parameters")?;
        if let Some((name, value)) = self.emission_factors.values.iter().find(|(_, v)| **v < 0.0) {
            bail!("emission_factors.values.{name} must not be negative (got {value})");
        }
        self.emission_factors()?;

        let mut seen = HashSet::new();
        for region in &self.regions {
            if region.code.is_empty() {
                bail!("every [[regions]] entry needs a code");
            }
            if !seen.insert(region.code.to_ascii_uppercase()) {
                bail!("region {} is configured twice", region.code);
            }
        }
        Ok(())
    }

    pub fn emission_factors(&self) -> Result<EmissionFactors> {
        EmissionFactors::with_overrides(
            self.emission_factors.version.clone(),
            self.emission_factors
                .values
                .iter()
                .map(|(name, value)| (name.as_str(), *value)),
        )
        .context("Invalid [emission_factors] table")
    }

    /// Configured regions, or the built-in list when none are configured.
    pub fn regions(&self) -> Vec<Region> {
        if self.regions.is_empty() {
            european_regions()
        } else {
            self.regions.clone()
        }
    }

    /// The regions named by `codes` (case-insensitive), all when empty.
    pub fn select_regions(&self, codes: &[String]) -> Result<Vec<Region>> {
        let regions = self.regions();
        if codes.is_empty() {
            return Ok(regions);
        }
        codes
            .iter()
            .map(|code| {
                regions
                    .iter()
                    .find(|r| r.code.eq_ignore_ascii_case(code))
                    .cloned()
                    .with_context(|| format!("Unknown region: {code}"))
            })
            .collect()
    }

    /// Pipeline parameters; `naming` overrides the configured table suffix.
    pub fn pipeline_options(&self, naming: Option<TableNaming>) -> Result<PipelineOptions> {
        Ok(PipelineOptions {
            naming: naming.unwrap_or_else(|| TableNaming::new(self.store.table_suffix.clone())),
            dedupe: self.store.dedupe,
            forecast: self.forecast.clone(),
            factors: self.emission_factors()?,
        })
    }
}
