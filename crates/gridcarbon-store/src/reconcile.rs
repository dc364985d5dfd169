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

//! Idempotent persistence of freshly computed batches.
//!
//! The stored range covering the new batch is queried for the region, rows
//! whose key is already stored are dropped (left anti-join on the key) and
//! only the remainder is written, in a single transaction. The new batch's
//! columns are the ones written; stored values for the dropped keys are
//! never read back into the result.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::batch::{RecordBatch, RecordKey};
use crate::error::{Result, StoreError};
use crate::sqlite::{RecordStore, WriteMode};

/// What to do with new rows whose (key, region) is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupeStrategy {
    /// Drop them; stored rows are never overwritten.
    #[default]
    SkipExisting,
    /// Overwrite the stored rows with the new values.
    Replace,
    /// Fail the whole call with [`StoreError::ReconciliationConflict`].
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileOutcome {
    /// Rows in the new batch
    pub candidates: usize,
    /// Of those, rows whose key was already stored
    pub existing: usize,
    /// Rows actually inserted or updated
    pub written: usize,
}

/// Merge `batch` into `table` for `region` according to `strategy`.
///
/// With [`DedupeStrategy::SkipExisting`] a second call with the same batch
/// writes nothing.
pub fn reconcile<S>(
    store: &S,
    table: &str,
    region: &str,
    batch: &RecordBatch,
    strategy: DedupeStrategy,
) -> Result<ReconcileOutcome>
where
    S: RecordStore + ?Sized,
{
    let Some((from, to)) = batch.key_range() else {
        return Ok(ReconcileOutcome::default());
    };

    let stored = store.query_range(table, region, &from, &to)?;
    let existing: HashSet<RecordKey> = stored.keys().iter().copied().collect();
    let overlap = batch.keys().iter().filter(|k| existing.contains(*k)).count();

    let written = match strategy {
        DedupeStrategy::SkipExisting => {
            let fresh = batch.retain_keys(|key| !existing.contains(key));
            store.write(table, region, &fresh, WriteMode::InsertIfAbsent)?
        }
        DedupeStrategy::Replace => store.write(table, region, batch, WriteMode::Upsert)?,
        DedupeStrategy::Reject if overlap > 0 => {
            return Err(StoreError::ReconciliationConflict {
                table: table.to_owned(),
                region: region.to_owned(),
                conflicting: overlap,
            });
        }
        DedupeStrategy::Reject => store.write(table, region, batch, WriteMode::InsertIfAbsent)?,
    };

    let outcome = ReconcileOutcome {
        candidates: batch.len(),
        existing: overlap,
        written,
    };
    info!(
        table,
        region,
        queried = stored.len(),
        new = outcome.candidates - outcome.existing,
        skipped = if strategy == DedupeStrategy::Replace { 0 } else { outcome.existing },
        written = outcome.written,
        ?strategy,
        "Reconciled"
    );
    Ok(outcome)
}
