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

//! Error types for the store crate

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{conflicting} row(s) of '{table}' for region {region} already stored")]
    ReconciliationConflict {
        table: String,
        region: String,
        conflicting: usize,
    },

    #[error("invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    #[error("schema mismatch on '{table}': {reason}")]
    SchemaMismatch { table: String, reason: String },

    #[error("invalid record batch: {0}")]
    InvalidBatch(String),

    #[error("sql error: {0}")]
    Sql(#[source] rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    /// Failures to reach the database file are reported as unavailability,
    /// everything else as a plain SQL error.
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        let unavailable = err.sqlite_error_code().is_some_and(|code| {
            matches!(
                code,
                ErrorCode::CannotOpen
                    | ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::NotADatabase
                    | ErrorCode::ReadOnly
                    | ErrorCode::DiskFull
            )
        });
        if unavailable {
            Self::StoreUnavailable(err.to_string())
        } else {
            Self::Sql(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
