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

//! Calendar and lag covariates derived from a table's index.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, TimeDelta, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::Result;
use crate::table::TimeTable;

pub const HOUR_COLUMN: &str = "hour";
pub const DAY_OF_WEEK_COLUMN: &str = "dayofweek";

/// Lag used by [`add_lag_feature`] when callers have no better choice.
pub const DEFAULT_LAG_HOURS: i64 = 72;
pub const DEFAULT_LAG_COLUMN: &str = "lag1";

/// Append hour-of-day (0-23) and day-of-week (0 = Monday … 6 = Sunday),
/// both in the region's local time. Applying this to an already featured
/// table rewrites the same two columns with identical values.
pub fn add_calendar_features(table: &TimeTable, tz: Tz) -> Result<TimeTable> {
    let local: Vec<DateTime<Tz>> = table.index().iter().map(|ts| ts.with_timezone(&tz)).collect();

    let mut featured = table.clone();
    featured.set_dense_column(
        HOUR_COLUMN,
        local.iter().map(|ts| f64::from(ts.hour())).collect(),
    )?;
    featured.set_dense_column(
        DAY_OF_WEEK_COLUMN,
        local
            .iter()
            .map(|ts| f64::from(ts.weekday().num_days_from_monday()))
            .collect(),
    )?;
    Ok(featured)
}

/// Map each row to the value of `target` observed `lag` earlier, by direct
/// index lookup. Rows without an observation at that offset get `None`.
///
/// Not part of the default forecast feature set.
pub fn add_lag_feature(
    table: &TimeTable,
    target: &str,
    lag: TimeDelta,
    name: &str,
) -> Result<TimeTable> {
    let values = table.require_column(target)?;
    let by_time: HashMap<DateTime<Utc>, Option<f64>> = table
        .index()
        .iter()
        .copied()
        .zip(values.iter().copied())
        .collect();

    let lagged = table
        .index()
        .iter()
        .map(|ts| by_time.get(&(*ts - lag)).copied().flatten())
        .collect();

    let mut featured = table.clone();
    featured.set_column(name, lagged)?;
    Ok(featured)
}
