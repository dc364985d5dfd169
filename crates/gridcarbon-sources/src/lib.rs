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

//! GridCarbon sources
//!
//! Upstream data for the pipeline: generation, load and day-ahead prices from
//! the ENTSO-E transparency platform, hourly weather from WeatherAPI.com.

pub mod entsoe;
pub mod error;
pub mod traits;
pub mod weather;

pub use entsoe::EntsoeClient;
pub use error::{FetchError, Result};
pub use traits::{GridDataSource, LOAD_COLUMN, PRICE_COLUMN, WeatherSource};
pub use weather::{WEATHER_COLUMNS, WeatherApiClient};
