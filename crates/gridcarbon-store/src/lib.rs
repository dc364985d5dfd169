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

//! GridCarbon store
//!
//! Region-tagged tables keyed by timestamp or date, held in SQLite, and the
//! reconciliation step that writes only rows not stored yet.

pub mod batch;
pub mod error;
pub mod reconcile;
pub mod sqlite;

pub use batch::{BatchColumn, ColumnValues, KeyKind, RecordBatch, RecordKey};
pub use error::{Result, StoreError};
pub use reconcile::{DedupeStrategy, ReconcileOutcome, reconcile};
pub use sqlite::{REGION_COLUMN, RecordStore, SqliteStore, WriteMode};
