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

//! Error types for the core crate

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("index is not strictly increasing at row {0}")]
    UnsortedIndex(usize),

    #[error("duplicate index entry at row {0}")]
    DuplicateIndex(usize),

    #[error("column '{name}' has {actual} values but the index has {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("column '{0}' not found")]
    MissingColumn(String),

    #[error("unknown generation category: {0}")]
    UnknownCategory(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("insufficient training data: {rows} usable rows, at least {required} required")]
    InsufficientTrainingData { rows: usize, required: usize },

    #[error("feature schema mismatch: missing {missing:?} (model expects {expected:?})")]
    FeatureSchemaMismatch {
        missing: Vec<String>,
        expected: Vec<String>,
    },

    #[error("target column '{0}' not found in training table")]
    MissingTarget(String),

    #[error("invalid boosting parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Table(#[from] TableError),
}

pub type Result<T, E = TableError> = std::result::Result<T, E>;
