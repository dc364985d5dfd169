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

//! Carbon intensity forecasting from weather and calendar covariates.
//!
//! A fresh [`GradientBoostedModel`] is fitted on every run from the recent
//! history of a region, then applied to the weather forecast rows that lie
//! strictly after that history.

mod booster;
mod tree;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::info;

pub use booster::{BoostingParams, GradientBoostedModel, MIN_TRAINING_ROWS};

use crate::emissions::CARBON_INTENSITY_COLUMN;
use crate::error::ForecastError;
use crate::features::{DAY_OF_WEEK_COLUMN, HOUR_COLUMN};
use crate::table::TimeTable;

pub const TARGET_COLUMN: &str = CARBON_INTENSITY_COLUMN;
pub const PREDICTION_COLUMN: &str = "Cei_prediction";

pub const DEFAULT_FEATURES: [&str; 12] = [
    "temp_c",
    "wind_kph",
    "wind_degree",
    "pressure_mb",
    "precip_mm",
    "humidity",
    "cloud",
    "feelslike_c",
    "windchill_c",
    "vis_km",
    HOUR_COLUMN,
    DAY_OF_WEEK_COLUMN,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Days of history the model is trained on
    pub training_days: u32,
    /// Days of weather forecast to predict for
    pub horizon_days: u32,
    pub features: Vec<String>,
    pub target: String,
    #[serde(flatten)]
    pub boosting: BoostingParams,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            training_days: 7,
            horizon_days: 3,
            features: DEFAULT_FEATURES.iter().map(|&f| f.to_owned()).collect(),
            target: TARGET_COLUMN.to_owned(),
            boosting: BoostingParams::default(),
        }
    }
}

/// Rows of `inference` whose timestamps do not occur in `training`.
#[must_use]
pub fn future_rows(inference: &TimeTable, training: &TimeTable) -> TimeTable {
    let known: HashSet<_> = training.index().iter().copied().collect();
    inference.filter_rows(|_, ts| !known.contains(&ts))
}

/// Fit a model on the rows of `training` that carry a finite target.
pub fn fit_model(
    training: &TimeTable,
    config: &ForecastConfig,
) -> Result<GradientBoostedModel, ForecastError> {
    let target = training
        .column(&config.target)
        .ok_or_else(|| ForecastError::MissingTarget(config.target.clone()))?;
    let usable = training.filter_rows(|row, _| target[row].is_some_and(f64::is_finite));

    if usable.len() < MIN_TRAINING_ROWS {
        return Err(ForecastError::InsufficientTrainingData {
            rows: usable.len(),
            required: MIN_TRAINING_ROWS,
        });
    }

    let missing: Vec<String> = config
        .features
        .iter()
        .filter(|name| !usable.has_column(name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ForecastError::FeatureSchemaMismatch {
            missing,
            expected: config.features.clone(),
        });
    }

    let columns = config
        .features
        .iter()
        .map(|name| usable.require_column(name).map(<[_]>::to_vec))
        .collect::<Result<Vec<_>, _>>()?;
    let y: Vec<f64> = usable
        .require_column(&config.target)?
        .iter()
        .map(|v| v.unwrap_or_default())
        .collect();

    GradientBoostedModel::fit(config.features.clone(), columns, &y, &config.boosting)
}

/// Train on `training` and predict [`PREDICTION_COLUMN`] for every row of
/// `inference` not already covered by the training history. The returned
/// table carries the inference covariates plus the prediction.
pub fn train_and_predict(
    training: &TimeTable,
    inference: &TimeTable,
    config: &ForecastConfig,
) -> Result<TimeTable, ForecastError> {
    let future = future_rows(inference, training);

    let missing: Vec<String> = config
        .features
        .iter()
        .filter(|name| !future.has_column(name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ForecastError::FeatureSchemaMismatch {
            missing,
            expected: config.features.clone(),
        });
    }

    let model = fit_model(training, config)?;
    info!(
        trees = model.n_trees(),
        rounds = model.rounds_run(),
        rmse = model.training_rmse(),
        rows = future.len(),
        "Forecast model trained"
    );

    let predictions = model.predict_table(&future)?;
    let mut forecast = future;
    forecast.set_dense_column(PREDICTION_COLUMN, predictions)?;
    Ok(forecast)
}
