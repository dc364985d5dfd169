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

use gridcarbon_core::{EmissionFactors, ForecastConfig};
use gridcarbon_store::DedupeStrategy;
use serde::{Deserialize, Serialize};

/// Base names of the stored tables.
pub mod tables {
    pub const GENERATION: &str = "generation";
    pub const EMISSIONS: &str = "emissions";
    pub const LOAD: &str = "load";
    pub const PRICES: &str = "prices";
    pub const WEATHER: &str = "weather";
    pub const FORECAST: &str = "forecast_data";
    pub const TIME_PERIODS: &str = "time_periods";
}

/// Maps base table names to the names actually used in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableNaming {
    pub suffix: String,
}

impl TableNaming {
    pub const HISTORICAL_SUFFIX: &'static str = "_historical";

    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    /// Naming of the backfill tables, `generation_historical` etc.
    #[must_use]
    pub fn historical() -> Self {
        Self::new(Self::HISTORICAL_SUFFIX)
    }

    #[must_use]
    pub fn table(&self, base: &str) -> String {
        format!("{base}{}", self.suffix)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub naming: TableNaming,
    pub dedupe: DedupeStrategy,
    pub forecast: ForecastConfig,
    pub factors: EmissionFactors,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_naming() {
        assert_eq!(TableNaming::default().table(tables::EMISSIONS), "emissions");
        assert_eq!(
            TableNaming::historical().table(tables::GENERATION),
            "generation_historical"
        );
    }
}
