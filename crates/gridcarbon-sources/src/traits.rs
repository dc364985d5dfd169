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

use chrono::{DateTime, NaiveDate, Utc};
use gridcarbon_core::{GenerationSnapshot, Region, TimeTable};

use crate::error::Result;

/// Column of the table returned by [`GridDataSource::load`].
pub const LOAD_COLUMN: &str = "Load";
/// Column of the table returned by [`GridDataSource::prices`].
pub const PRICE_COLUMN: &str = "Price";

/// Transmission system operator data for a region and `[start, end)`.
pub trait GridDataSource: Send + Sync {
    /// Actual generation per production type, MW
    fn generation(
        &self,
        region: &Region,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<GenerationSnapshot>;

    /// Actual total load, MW
    fn load(&self, region: &Region, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<TimeTable>;

    /// Day-ahead prices, EUR/MWh
    fn prices(&self, region: &Region, start: DateTime<Utc>, end: DateTime<Utc>)
    -> Result<TimeTable>;
}

/// Hourly weather for a region's reference city.
pub trait WeatherSource: Send + Sync {
    /// Forecast for today and the following `days - 1` days
    fn forecast(&self, region: &Region, days: u32) -> Result<TimeTable>;

    /// Observed weather for one local calendar day
    fn history(&self, region: &Region, date: NaiveDate) -> Result<TimeTable>;
}
