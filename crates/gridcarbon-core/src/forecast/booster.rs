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

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tree::{FeatureMatrix, RegressionTree, TreeParams};
use crate::error::{ForecastError, TableError};
use crate::table::TimeTable;

/// Fewer usable rows than this cannot produce a meaningful split.
pub const MIN_TRAINING_ROWS: usize = 2;

/// Hyperparameters of the squared-error gradient boosted regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    /// Upper bound on boosting rounds
    pub max_rounds: usize,
    /// Stop once training error has not improved for this many rounds; 0 disables
    pub early_stopping_rounds: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// Initial prediction for every row
    pub base_score: f64,
    /// L2 regularization on leaf weights
    pub lambda: f64,
    pub min_child_weight: f64,
    /// Fraction of rows sampled per round, in (0, 1]
    pub subsample: f64,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            max_rounds: 5000,
            early_stopping_rounds: 50,
            max_depth: 5,
            learning_rate: 0.02,
            base_score: 0.5,
            lambda: 1.0,
            min_child_weight: 1.0,
            subsample: 1.0,
            seed: 0,
        }
    }
}

impl BoostingParams {
    pub fn validate(&self) -> Result<(), ForecastError> {
        let invalid = |msg: &str| Err(ForecastError::InvalidParameter(msg.to_owned()));

        if self.max_rounds == 0 {
            return invalid("max_rounds must be at least 1");
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return invalid("learning_rate must be positive");
        }
        if !(self.lambda >= 0.0 && self.lambda.is_finite()) {
            return invalid("lambda must be non-negative");
        }
        if !(self.min_child_weight >= 0.0 && self.min_child_weight.is_finite()) {
            return invalid("min_child_weight must be non-negative");
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return invalid("subsample must be in (0, 1]");
        }
        if !self.base_score.is_finite() {
            return invalid("base_score must be finite");
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            lambda: self.lambda,
            min_child_weight: self.min_child_weight,
            learning_rate: self.learning_rate,
        }
    }
}

/// An ensemble of regression trees fitted to one target.
///
/// Models are trained per run and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientBoostedModel {
    feature_names: Vec<String>,
    base_score: f64,
    trees: Vec<RegressionTree>,
    rounds_run: usize,
    training_rmse: f64,
}

fn rmse(predictions: &[f64], target: &[f64]) -> f64 {
    let sum: f64 = predictions
        .iter()
        .zip(target)
        .map(|(p, y)| (p - y).powi(2))
        .sum();
    (sum / target.len() as f64).sqrt()
}

impl GradientBoostedModel {
    /// Fit to `target` using `columns`, one per entry of `feature_names`.
    /// Every column must have one cell per target value.
    pub fn fit(
        feature_names: Vec<String>,
        columns: Vec<Vec<Option<f64>>>,
        target: &[f64],
        params: &BoostingParams,
    ) -> Result<Self, ForecastError> {
        params.validate()?;
        if feature_names.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "at least one feature is required".to_owned(),
            ));
        }
        if target.len() < MIN_TRAINING_ROWS {
            return Err(ForecastError::InsufficientTrainingData {
                rows: target.len(),
                required: MIN_TRAINING_ROWS,
            });
        }
        for (name, column) in feature_names.iter().zip(&columns) {
            if column.len() != target.len() {
                return Err(TableError::LengthMismatch {
                    name: name.clone(),
                    expected: target.len(),
                    actual: column.len(),
                }
                .into());
            }
        }

        let n = target.len();
        let matrix = FeatureMatrix::new(columns, n);
        let tree_params = params.tree_params();
        let hess = vec![1.0; n];
        let all_rows: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(params.seed);

        let mut predictions = vec![params.base_score; n];
        let mut trees: Vec<RegressionTree> = Vec::new();
        let mut best_rmse = f64::INFINITY;
        let mut best_len = 0;

        for round in 0..params.max_rounds {
            let grad: Vec<f64> = predictions.iter().zip(target).map(|(p, y)| p - y).collect();
            let rows: Vec<usize> = if params.subsample < 1.0 {
                all_rows
                    .iter()
                    .copied()
                    .filter(|_| rng.gen_bool(params.subsample))
                    .collect()
            } else {
                all_rows.clone()
            };
            if rows.is_empty() {
                continue;
            }

            let tree = RegressionTree::fit(&matrix, &grad, &hess, &rows, tree_params);
            for (row, prediction) in predictions.iter_mut().enumerate() {
                *prediction += tree.predict(|feature| matrix.value(feature, row));
            }
            trees.push(tree);

            let score = rmse(&predictions, target);
            if score < best_rmse {
                best_rmse = score;
                best_len = trees.len();
            } else if params.early_stopping_rounds > 0
                && trees.len() - best_len >= params.early_stopping_rounds
            {
                debug!(round, best_round = best_len, rmse = best_rmse, "Early stopping");
                break;
            }
        }

        let rounds_run = trees.len();
        if params.early_stopping_rounds > 0 {
            trees.truncate(best_len);
        }

        Ok(Self {
            feature_names,
            base_score: params.base_score,
            trees,
            rounds_run,
            training_rmse: best_rmse,
        })
    }

    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Trees kept after early stopping.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[must_use]
    pub fn rounds_run(&self) -> usize {
        self.rounds_run
    }

    #[must_use]
    pub fn training_rmse(&self) -> f64 {
        self.training_rmse
    }

    /// Feature names this model needs that `table` does not carry.
    #[must_use]
    pub fn missing_features(&self, table: &TimeTable) -> Vec<String> {
        self.feature_names
            .iter()
            .filter(|name| !table.has_column(name))
            .cloned()
            .collect()
    }

    /// Predict one value per row of `table`. Columns the model was not
    /// trained on are ignored.
    pub fn predict_table(&self, table: &TimeTable) -> Result<Vec<f64>, ForecastError> {
        let missing = self.missing_features(table);
        if !missing.is_empty() {
            return Err(ForecastError::FeatureSchemaMismatch {
                missing,
                expected: self.feature_names.clone(),
            });
        }

        let columns = self
            .feature_names
            .iter()
            .map(|name| table.require_column(name))
            .collect::<Result<Vec<_>, TableError>>()?;

        Ok((0..table.len())
            .map(|row| {
                self.trees
                    .iter()
                    .map(|tree| tree.predict(|feature| columns[feature][row]))
                    .sum::<f64>()
                    + self.base_score
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_params() -> BoostingParams {
        BoostingParams {
            max_rounds: 200,
            early_stopping_rounds: 10,
            learning_rate: 0.3,
            ..BoostingParams::default()
        }
    }

    #[test]
    fn test_default_params_are_valid() {
        assert!(BoostingParams::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_params_are_rejected() {
        let params = BoostingParams {
            subsample: 0.0,
            ..BoostingParams::default()
        };
        assert!(matches!(params.validate(), Err(ForecastError::InvalidParameter(_))));

        let params = BoostingParams {
            learning_rate: -1.0,
            ..BoostingParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_single_row_is_insufficient() {
        let result = GradientBoostedModel::fit(
            vec!["x".to_owned()],
            vec![vec![Some(1.0)]],
            &[1.0],
            &quick_params(),
        );
        assert_eq!(
            result,
            Err(ForecastError::InsufficientTrainingData {
                rows: 1,
                required: MIN_TRAINING_ROWS
            })
        );
    }

    #[test]
    fn test_constant_target_stops_early_on_plateau() {
        let x: Vec<Option<f64>> = (0..20).map(|i| Some(f64::from(i))).collect();
        let y = vec![0.5; 20];
        let model =
            GradientBoostedModel::fit(vec!["x".to_owned()], vec![x], &y, &quick_params()).unwrap();

        // base_score already fits, so no round improves after the first.
        assert!(model.rounds_run() <= 11);
        assert!(model.n_trees() <= 1);
        assert!(model.training_rmse() < 1e-9);
    }

    #[test]
    fn test_fits_linear_trend() {
        let x: Vec<Option<f64>> = (0..50).map(|i| Some(f64::from(i))).collect();
        let y: Vec<f64> = (0..50).map(|i| 2.0 * f64::from(i) + 10.0).collect();
        let model =
            GradientBoostedModel::fit(vec!["x".to_owned()], vec![x], &y, &quick_params()).unwrap();

        assert!(model.training_rmse() < 5.0);
    }

    #[test]
    fn test_subsampled_fit_is_deterministic_per_seed() {
        let x: Vec<Option<f64>> = (0..40).map(|i| Some(f64::from(i % 7))).collect();
        let y: Vec<f64> = (0..40).map(|i| f64::from(i % 7) * 3.0).collect();
        let params = BoostingParams {
            subsample: 0.7,
            seed: 42,
            ..quick_params()
        };

        let a = GradientBoostedModel::fit(vec!["x".to_owned()], vec![x.clone()], &y, &params).unwrap();
        let b = GradientBoostedModel::fit(vec!["x".to_owned()], vec![x], &y, &params).unwrap();
        assert_eq!(a, b);
    }
}
