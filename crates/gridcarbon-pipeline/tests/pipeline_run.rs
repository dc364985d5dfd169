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

//! End-to-end runs against fake upstream sources and a SQLite store.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Timelike, Utc};
use chrono_tz::Europe::Prague;
use gridcarbon_core::{BoostingParams, ForecastConfig, GenerationSnapshot, Region, TimeTable};
use gridcarbon_pipeline::{Pipeline, PipelineOptions, Stage, TableNaming, local_midnight, tables};
use gridcarbon_sources::{
    FetchError, GridDataSource, LOAD_COLUMN, PRICE_COLUMN, WEATHER_COLUMNS, WeatherSource,
};
use gridcarbon_store::SqliteStore;

#[derive(Debug, Default)]
struct FakeGrid {
    fail_load: bool,
}

fn hours(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut out = Vec::new();
    let mut ts = start;
    while ts < end {
        out.push(ts);
        ts += TimeDelta::hours(1);
    }
    out
}

fn series(
    index: &[DateTime<Utc>],
    value: impl Fn(DateTime<Utc>) -> f64,
) -> BTreeMap<DateTime<Utc>, f64> {
    index.iter().map(|ts| (*ts, value(*ts))).collect()
}

fn solar(ts: DateTime<Utc>) -> f64 {
    let hour = f64::from(ts.hour());
    (800.0 * (PI * (hour - 4.0) / 14.0).sin()).max(0.0)
}

impl GridDataSource for FakeGrid {
    fn generation(
        &self,
        _region: &Region,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> gridcarbon_sources::Result<GenerationSnapshot> {
        let index = hours(start, end);
        let aggregated = || Some("Actual Aggregated".to_owned());
        Ok(GenerationSnapshot::from_labelled(vec![
            ("Solar".to_owned(), aggregated(), series(&index, solar)),
            ("Fossil Gas".to_owned(), aggregated(), series(&index, |_| 400.0)),
            ("Nuclear".to_owned(), aggregated(), series(&index, |_| 2000.0)),
        ]))
    }

    fn load(
        &self,
        _region: &Region,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> gridcarbon_sources::Result<TimeTable> {
        if self.fail_load {
            return Err(FetchError::Status {
                status: 503,
                message: "Service Unavailable".to_owned(),
            });
        }
        let index = hours(start, end);
        Ok(TimeTable::from_series([(LOAD_COLUMN, series(&index, |_| 6000.0))]))
    }

    fn prices(
        &self,
        _region: &Region,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> gridcarbon_sources::Result<TimeTable> {
        let index = hours(start, end);
        let price = |ts: DateTime<Utc>| 50.0 + f64::from(ts.hour());
        Ok(TimeTable::from_series([(PRICE_COLUMN, series(&index, price))]))
    }
}

/// Weather as seen on `today`: forecasts start at local midnight of it.
#[derive(Debug)]
struct FakeWeather {
    today: NaiveDate,
}

fn weather_table(index: &[DateTime<Utc>]) -> TimeTable {
    TimeTable::from_series(WEATHER_COLUMNS.iter().enumerate().map(|(i, name)| {
        let offset = i as f64;
        (
            *name,
            series(index, |ts| offset * 10.0 + solar(ts) / 40.0),
        )
    }))
}

impl WeatherSource for FakeWeather {
    fn forecast(&self, region: &Region, days: u32) -> gridcarbon_sources::Result<TimeTable> {
        let start = local_midnight(self.today, region.timezone)
            .map_err(|e| FetchError::Malformed(e.to_string()))?;
        let index = hours(start, start + TimeDelta::days(i64::from(days)));
        Ok(weather_table(&index))
    }

    fn history(&self, region: &Region, date: NaiveDate) -> gridcarbon_sources::Result<TimeTable> {
        let start = local_midnight(date, region.timezone)
            .map_err(|e| FetchError::Malformed(e.to_string()))?;
        let index = hours(start, start + TimeDelta::days(1));
        Ok(weather_table(&index))
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 12, 10, 0, 0).unwrap()
}

fn czechia() -> Region {
    Region::new("CZ", "Czech Republic", "Prague", Prague)
}

fn options() -> PipelineOptions {
    PipelineOptions {
        forecast: ForecastConfig {
            boosting: BoostingParams {
                max_rounds: 60,
                early_stopping_rounds: 10,
                learning_rate: 0.1,
                ..BoostingParams::default()
            },
            ..ForecastConfig::default()
        },
        ..PipelineOptions::default()
    }
}

fn pipeline(grid: FakeGrid) -> Pipeline<FakeGrid, FakeWeather, SqliteStore> {
    let weather = FakeWeather {
        today: NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(),
    };
    Pipeline::new(grid, weather, SqliteStore::open_in_memory().unwrap(), options())
}

#[test]
fn test_full_run_writes_every_table() {
    let pipeline = pipeline(FakeGrid::default());
    let report = pipeline.run(&czechia(), now(), &Stage::ALL);

    assert!(report.is_success(), "{report:#?}");
    let store = pipeline.store();
    // Yesterday and today, local time
    assert_eq!(store.count(tables::GENERATION, "CZ").unwrap(), 48);
    assert_eq!(store.count(tables::EMISSIONS, "CZ").unwrap(), 48);
    assert_eq!(store.count(tables::LOAD, "CZ").unwrap(), 48);
    assert_eq!(store.count(tables::PRICES, "CZ").unwrap(), 48);
    assert_eq!(store.count(tables::WEATHER, "CZ").unwrap(), 72);
    // Forecast hours already covered by the training window are dropped.
    assert_eq!(store.count(tables::FORECAST, "CZ").unwrap(), 60);
    // One record per local date of the forecast
    assert_eq!(store.count(tables::TIME_PERIODS, "CZ").unwrap(), 3);
}

#[test]
fn test_second_run_writes_nothing() {
    let pipeline = pipeline(FakeGrid::default());
    let first = pipeline.run(&czechia(), now(), &Stage::ALL);
    assert!(first.rows_written() > 0);

    let second = pipeline.run(&czechia(), now(), &Stage::ALL);
    assert!(second.is_success(), "{second:#?}");
    assert_eq!(second.rows_written(), 0);
    assert_eq!(pipeline.store().count(tables::EMISSIONS, "CZ").unwrap(), 48);
}

#[test]
fn test_failing_stage_does_not_stop_the_others() {
    let pipeline = pipeline(FakeGrid { fail_load: true });
    let report = pipeline.run(&czechia(), now(), &Stage::ALL);

    assert_eq!(report.failed_stages().collect::<Vec<_>>(), vec![Stage::Load]);
    assert_eq!(report.stages.len(), Stage::ALL.len());
    assert_eq!(pipeline.store().count(tables::LOAD, "CZ").unwrap(), 0);
    assert_eq!(pipeline.store().count(tables::PRICES, "CZ").unwrap(), 48);
    assert_eq!(pipeline.store().count(tables::TIME_PERIODS, "CZ").unwrap(), 3);
}

#[test]
fn test_windows_without_forecast_fail() {
    let pipeline = pipeline(FakeGrid::default());
    let report = pipeline.run(&czechia(), now(), &[Stage::Windows]);

    assert_eq!(report.failed_stages().collect::<Vec<_>>(), vec![Stage::Windows]);
    match &report.stages[0].status {
        gridcarbon_pipeline::StageStatus::Failed(message) => {
            assert!(message.contains("no stored forecast"), "{message}");
        }
        other => panic!("expected a failure, got {other:?}"),
    }
}

#[test]
fn test_backfill_into_historical_tables() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("gridcarbon.db")).unwrap();
    let weather = FakeWeather {
        today: NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(),
    };
    let options = PipelineOptions {
        naming: TableNaming::historical(),
        ..options()
    };
    let pipeline = Pipeline::new(FakeGrid::default(), weather, store, options);

    let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
    let report = pipeline.backfill(&czechia(), start, end, &Stage::ALL);

    // Forecast-type stages are not part of a backfill.
    assert_eq!(report.stages.len(), Stage::HISTORICAL.len());
    assert!(report.is_success(), "{report:#?}");
    assert_eq!(report.written_to("generation_historical"), 72);

    let tables = pipeline.store().tables().unwrap();
    assert!(tables.contains(&"emissions_historical".to_owned()));
    assert!(!tables.contains(&"emissions".to_owned()));
}

#[test]
fn test_backfill_splits_long_ranges() {
    let pipeline = pipeline(FakeGrid::default());
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    let report = pipeline.backfill(&czechia(), start, end, &[Stage::Prices]);

    // 75 days in chunks of 30
    assert_eq!(report.stages.len(), 3);
    let (first_from, _) = report.stages[0].range.unwrap();
    let (_, last_to) = report.stages[2].range.unwrap();
    assert_eq!(first_from, Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap());
    assert_eq!(last_to, Utc.with_ymd_and_hms(2024, 3, 15, 23, 0, 0).unwrap());
    assert!(report.is_success());
}
