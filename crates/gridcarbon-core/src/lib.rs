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

//! GridCarbon core
//!
//! Pure transforms from per-technology generation measurements to carbon
//! intensity, and the short-horizon intensity forecast.
//!
//! ## Pipeline
//!
//! - **Category mapping**: raw ENTSO-E production types onto a fixed category set
//! - **Emissions**: category output x emission factor, aggregate carbon intensity
//! - **Features**: calendar covariates (and optional lagged target)
//! - **Forecast**: gradient-boosted regression trees retrained on every run
//! - **Low-carbon windows**: cheapest-carbon hours per day from a forecast

pub mod category;
pub mod emissions;
pub mod error;
pub mod features;
pub mod forecast;
pub mod periods;
pub mod region;
pub mod table;

pub use category::{CATEGORY_SET_VERSION, Category, GenerationSnapshot, RawSeries, map_generation};
pub use emissions::{EMISSION_SUFFIX, EmissionFactors, calculate_emissions};
pub use error::{ForecastError, TableError};
pub use features::{add_calendar_features, add_lag_feature};
pub use forecast::{
    BoostingParams, DEFAULT_FEATURES, ForecastConfig, GradientBoostedModel, PREDICTION_COLUMN,
    TARGET_COLUMN, train_and_predict,
};
pub use periods::{DailyWindows, LowCarbonWindow, find_low_carbon_windows, reference_intensity};
pub use region::{Region, european_regions};
pub use table::{Column, TimeTable};
