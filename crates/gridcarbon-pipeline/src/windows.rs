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

//! Date-keyed records of the daily low-carbon windows.

use chrono::{DateTime, Utc};
use gridcarbon_core::{DailyWindows, LowCarbonWindow};
use gridcarbon_store::{ColumnValues, KeyKind, RecordBatch, RecordKey, Result};

pub const FIRST_START: &str = "first_start";
pub const FIRST_END: &str = "first_end";
pub const FIRST_INTENSITY: &str = "first_intensity";
pub const SECOND_START: &str = "second_start";
pub const SECOND_END: &str = "second_end";
pub const SECOND_INTENSITY: &str = "second_intensity";

fn timestamp_text(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn window_columns(
    batch: &mut RecordBatch,
    windows: &[Option<&LowCarbonWindow>],
    names: [&str; 3],
) -> Result<()> {
    let [start, end, intensity] = names;
    batch.push_column(
        start,
        ColumnValues::Text(windows.iter().map(|w| w.map(|w| timestamp_text(w.start))).collect()),
    )?;
    batch.push_column(
        end,
        ColumnValues::Text(windows.iter().map(|w| w.map(|w| timestamp_text(w.end))).collect()),
    )?;
    // A day without a window still gets a record so it is not recomputed as new.
    batch.push_column(
        intensity,
        ColumnValues::Real(
            windows
                .iter()
                .map(|w| Some(w.map_or(0.0, |w| w.mean_intensity)))
                .collect(),
        ),
    )
}

/// One record per date with the lowest and second lowest window.
pub fn windows_batch(days: &[DailyWindows]) -> Result<RecordBatch> {
    let mut batch = RecordBatch::new(
        KeyKind::Date,
        days.iter().map(|d| RecordKey::Date(d.date)).collect(),
    )?;
    let first: Vec<_> = days.iter().map(DailyWindows::first).collect();
    let second: Vec<_> = days.iter().map(DailyWindows::second).collect();
    window_columns(&mut batch, &first, [FIRST_START, FIRST_END, FIRST_INTENSITY])?;
    window_columns(&mut batch, &second, [SECOND_START, SECOND_END, SECOND_INTENSITY])?;
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta, TimeZone};
    use chrono_tz::UTC;
    use gridcarbon_core::{TimeTable, find_low_carbon_windows};

    #[test]
    fn test_windows_batch_has_a_record_for_every_day() {
        let start = Utc.with_ymd_and_hms(2024, 4, 10, 0, 0, 0).unwrap();
        let mut values = vec![500.0; 48];
        values[3] = 100.0;
        values[4] = 150.0;
        values[10] = 50.0;
        let index = (0..48).map(|h| start + TimeDelta::hours(h)).collect();
        let mut forecast = TimeTable::new(index).unwrap();
        forecast.set_dense_column("p", values).unwrap();

        let days = find_low_carbon_windows(&forecast, "p", 400.0, UTC).unwrap();
        let batch = windows_batch(&days).unwrap();

        assert_eq!(batch.kind(), KeyKind::Date);
        assert_eq!(
            batch.keys(),
            &[
                RecordKey::Date(NaiveDate::from_ymd_opt(2024, 4, 10).unwrap()),
                RecordKey::Date(NaiveDate::from_ymd_opt(2024, 4, 11).unwrap()),
            ]
        );
        assert_eq!(
            batch.column(FIRST_START),
            Some(&ColumnValues::Text(vec![
                Some("2024-04-10T10:00:00Z".to_owned()),
                None
            ]))
        );
        assert_eq!(
            batch.column(SECOND_END),
            Some(&ColumnValues::Text(vec![
                Some("2024-04-10T05:00:00Z".to_owned()),
                None
            ]))
        );
        assert_eq!(
            batch.column(SECOND_INTENSITY),
            Some(&ColumnValues::Real(vec![Some(125.0), Some(0.0)]))
        );
        assert_eq!(
            batch.column(FIRST_INTENSITY),
            Some(&ColumnValues::Real(vec![Some(50.0), Some(0.0)]))
        );
    }
}
