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

//! Contiguous low-carbon hours per local day, derived from a forecast.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeDelta, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::Result;
use crate::table::TimeTable;

/// Windows kept per day, lowest mean intensity first.
pub const MAX_WINDOWS_PER_DAY: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowCarbonWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Mean forecast intensity over the window's hours, gCO2eq/kWh
    pub mean_intensity: f64,
    hours: usize,
}

impl LowCarbonWindow {
    fn open(bucket: &HourBucket, intensity: f64) -> Self {
        Self {
            start: bucket.first,
            end: bucket.end(),
            mean_intensity: intensity,
            hours: 1,
        }
    }

    fn extend(&mut self, bucket: &HourBucket, intensity: f64) {
        let n = self.hours as f64;
        self.mean_intensity = (self.mean_intensity * n + intensity) / (n + 1.0);
        self.hours += 1;
        self.end = bucket.end();
    }

    #[must_use]
    pub fn hours(&self) -> usize {
        self.hours
    }
}

/// The selected windows of one local calendar day. Days whose hours all
/// reach the reference carry no windows but are still reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyWindows {
    pub date: NaiveDate,
    pub windows: Vec<LowCarbonWindow>,
}

impl DailyWindows {
    #[must_use]
    pub fn first(&self) -> Option<&LowCarbonWindow> {
        self.windows.first()
    }

    #[must_use]
    pub fn second(&self) -> Option<&LowCarbonWindow> {
        self.windows.get(1)
    }
}

/// Mean of the present values of `column`, the reference level windows are
/// compared against.
pub fn reference_intensity(table: &TimeTable, column: &str) -> Result<Option<f64>> {
    let present: Vec<f64> = table
        .require_column(column)?
        .iter()
        .filter_map(|v| v.filter(|x| x.is_finite()))
        .collect();
    if present.is_empty() {
        return Ok(None);
    }
    Ok(Some(present.iter().sum::<f64>() / present.len() as f64))
}

/// One local hour. On a fall-back day it spans two UTC hours.
#[derive(Debug)]
struct HourBucket {
    first: DateTime<Utc>,
    last: DateTime<Utc>,
    sum: f64,
    count: usize,
}

impl HourBucket {
    fn end(&self) -> DateTime<Utc> {
        self.last + TimeDelta::hours(1)
    }
}

/// Group `column` of `forecast` by local (date, hour), merge consecutive hours
/// whose mean is strictly below `reference` into windows and keep the
/// [`MAX_WINDOWS_PER_DAY`] lowest windows of each day.
pub fn find_low_carbon_windows(
    forecast: &TimeTable,
    column: &str,
    reference: f64,
    tz: Tz,
) -> Result<Vec<DailyWindows>> {
    let values = forecast.require_column(column)?;

    let mut days: BTreeMap<NaiveDate, Vec<LowCarbonWindow>> = BTreeMap::new();
    let mut buckets: BTreeMap<(NaiveDate, u32), HourBucket> = BTreeMap::new();
    for (ts, value) in forecast.index().iter().zip(values) {
        let local = ts.with_timezone(&tz);
        let date = local.date_naive();
        days.entry(date).or_default();

        let Some(value) = value.filter(|v| v.is_finite()) else {
            continue;
        };
        let bucket = buckets.entry((date, local.hour())).or_insert(HourBucket {
            first: *ts,
            last: *ts,
            sum: 0.0,
            count: 0,
        });
        bucket.first = bucket.first.min(*ts);
        bucket.last = bucket.last.max(*ts);
        bucket.sum += value;
        bucket.count += 1;
    }

    for ((date, _), bucket) in buckets {
        let mean = bucket.sum / bucket.count as f64;
        if mean >= reference {
            continue;
        }
        let windows = days.entry(date).or_default();
        match windows.last_mut() {
            Some(last) if last.end == bucket.first => last.extend(&bucket, mean),
            _ => windows.push(LowCarbonWindow::open(&bucket, mean)),
        }
    }

    Ok(days
        .into_iter()
        .map(|(date, mut windows)| {
            windows.sort_by(|a, b| a.mean_intensity.total_cmp(&b.mean_intensity));
            windows.truncate(MAX_WINDOWS_PER_DAY);
            DailyWindows { date, windows }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Prague;
    use chrono_tz::UTC;

    const COLUMN: &str = "Cei_prediction";

    fn forecast(start: DateTime<Utc>, values: &[f64]) -> TimeTable {
        let index = (0..values.len())
            .map(|h| start + TimeDelta::hours(h as i64))
            .collect();
        let mut table = TimeTable::new(index).unwrap();
        table.set_dense_column(COLUMN, values.to_vec()).unwrap();
        table
    }

    fn midnight() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 10, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_contiguous_low_hours_merge_with_running_mean() {
        let values = [500.0, 100.0, 200.0, 300.0, 500.0, 50.0, 500.0];
        let days = find_low_carbon_windows(&forecast(midnight(), &values), COLUMN, 400.0, UTC).unwrap();

        assert_eq!(days.len(), 1);
        let windows = &days[0].windows;
        assert_eq!(windows.len(), 2);

        // Lowest first: the single 05:00 hour, then 01:00-04:00.
        assert_eq!(windows[0].start, midnight() + TimeDelta::hours(5));
        assert_eq!(windows[0].end, midnight() + TimeDelta::hours(6));
        assert!((windows[0].mean_intensity - 50.0).abs() < 1e-9);

        assert_eq!(windows[1].start, midnight() + TimeDelta::hours(1));
        assert_eq!(windows[1].end, midnight() + TimeDelta::hours(4));
        assert_eq!(windows[1].hours(), 3);
        assert!((windows[1].mean_intensity - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_at_most_two_windows_per_day() {
        let values = [10.0, 900.0, 20.0, 900.0, 30.0, 900.0, 5.0];
        let days = find_low_carbon_windows(&forecast(midnight(), &values), COLUMN, 100.0, UTC).unwrap();

        let means: Vec<f64> = days[0].windows.iter().map(|w| w.mean_intensity).collect();
        assert_eq!(means, vec![5.0, 10.0]);
    }

    #[test]
    fn test_day_without_low_hours_is_reported_empty() {
        let mut values = vec![100.0; 24];
        values.extend(vec![900.0; 24]);
        let days = find_low_carbon_windows(&forecast(midnight(), &values), COLUMN, 500.0, UTC).unwrap();

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].windows.len(), 1);
        assert_eq!(days[0].first().unwrap().hours(), 24);
        assert!(days[1].windows.is_empty());
        assert!(days[1].first().is_none());
    }

    #[test]
    fn test_windows_do_not_cross_local_midnight() {
        // 21:00 UTC is 23:00 in Prague during summer time.
        let start = Utc.with_ymd_and_hms(2024, 7, 1, 21, 0, 0).unwrap();
        let days = find_low_carbon_windows(&forecast(start, &[1.0, 1.0, 1.0]), COLUMN, 10.0, Prague).unwrap();

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
        assert_eq!(days[0].first().unwrap().hours(), 1);
        assert_eq!(days[1].first().unwrap().start, start + TimeDelta::hours(1));
        assert_eq!(days[1].first().unwrap().hours(), 2);
    }

    #[test]
    fn test_repeated_fall_back_hour_stays_in_one_window() {
        // 01:00 CEST, 02:00 CEST, 02:00 CET, 03:00 CET on 2024-10-27
        let start = Utc.with_ymd_and_hms(2024, 10, 26, 23, 0, 0).unwrap();
        let values = [10.0, 20.0, 30.0, 40.0];
        let days = find_low_carbon_windows(&forecast(start, &values), COLUMN, 100.0, Prague).unwrap();

        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 10, 27).unwrap());
        assert_eq!(days[0].windows.len(), 1);
        let window = days[0].first().unwrap();
        assert_eq!(window.start, start);
        assert_eq!(window.end, start + TimeDelta::hours(4));
        assert_eq!(window.hours(), 3);
        // Local hour means 10, 25 and 40
        assert!((window.mean_intensity - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_skipped_spring_forward_hour_keeps_window_contiguous() {
        // 01:00 CET then 03:00 CEST on 2024-03-31
        let start = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();
        let days = find_low_carbon_windows(&forecast(start, &[10.0, 30.0]), COLUMN, 100.0, Prague).unwrap();

        assert_eq!(days[0].windows.len(), 1);
        assert_eq!(days[0].first().unwrap().end, start + TimeDelta::hours(2));
    }

    #[test]
    fn test_reference_intensity_ignores_missing_cells() {
        let mut table = forecast(midnight(), &[100.0, 300.0, 0.0]);
        table
            .set_column("ci", vec![Some(100.0), None, Some(300.0)])
            .unwrap();

        assert_eq!(reference_intensity(&table, "ci").unwrap(), Some(200.0));
        assert!(reference_intensity(&table, "absent").is_err());
    }
}
