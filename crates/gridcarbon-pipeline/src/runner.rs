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

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use gridcarbon_core::emissions::CARBON_INTENSITY_COLUMN;
use gridcarbon_core::table::floor_hour;
use gridcarbon_core::{
    PREDICTION_COLUMN, Region, TimeTable, add_calendar_features, calculate_emissions,
    find_low_carbon_windows, map_generation, reference_intensity, train_and_predict,
};
use gridcarbon_sources::{GridDataSource, WeatherSource};
use gridcarbon_store::{RecordBatch, RecordKey, RecordStore, reconcile};
use tracing::{debug, info};

use crate::options::{PipelineOptions, tables};
use crate::report::{RunReport, Stage, TableWrite};
use crate::windows::windows_batch;

/// Days fetched per upstream request during a backfill.
pub const BACKFILL_CHUNK_DAYS: i64 = 30;

/// First instant of `date` in `tz`. Where a DST change skips midnight the
/// day starts at the first existing hour.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> Result<DateTime<Utc>> {
    (0..3)
        .filter_map(|hour| date.and_hms_opt(hour, 0, 0))
        .find_map(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|ts| ts.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("{date} has no start of day in {tz}"))
}

/// Fetch, transform and reconcile every table of one region.
///
/// Generic over the upstream sources and the store so the same run serves
/// live loads, historical backfills and tests.
#[derive(Debug)]
pub struct Pipeline<G, W, S> {
    grid: G,
    weather: W,
    store: S,
    options: PipelineOptions,
}

impl<G, W, S> Pipeline<G, W, S>
where
    G: GridDataSource,
    W: WeatherSource,
    S: RecordStore,
{
    pub fn new(grid: G, weather: W, store: S, options: PipelineOptions) -> Self {
        Self {
            grid,
            weather,
            store,
            options,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Live run at `now`: generation, load and prices from the start of
    /// yesterday to the end of today (local time), then the weather and
    /// carbon intensity forecast and the low-carbon windows.
    pub fn run(&self, region: &Region, now: DateTime<Utc>, stages: &[Stage]) -> RunReport {
        info!(region = %region.code, %now, ?stages, "Starting pipeline run");
        let mut report = RunReport::new(&region.code);

        let range = live_range(region.timezone, now);
        for &stage in stages {
            let (covered, result) = match stage {
                Stage::Generation | Stage::Load | Stage::Prices => match &range {
                    Ok((start, end)) => (
                        Some((*start, *end)),
                        self.range_stage(stage, region, *start, *end),
                    ),
                    Err(e) => (None, Err(anyhow!("{e:#}"))),
                },
                Stage::Weather => (None, self.weather_stage(region)),
                Stage::Forecast => (None, self.forecast_stage(region, now)),
                Stage::Windows => (None, self.windows_stage(region, now)),
            };
            report.record(stage, covered, result);
        }

        info!(
            region = %region.code,
            written = report.rows_written(),
            failed = report.failed_stages().count(),
            "Pipeline run finished"
        );
        report
    }

    /// Historical load of `[start, end]` (both dates inclusive, local time)
    /// in chunks of [`BACKFILL_CHUNK_DAYS`]. Only range-based stages run;
    /// the others are skipped.
    pub fn backfill(
        &self,
        region: &Region,
        start: NaiveDate,
        end: NaiveDate,
        stages: &[Stage],
    ) -> RunReport {
        info!(region = %region.code, %start, %end, "Starting backfill");
        let mut report = RunReport::new(&region.code);
        let stages: Vec<Stage> = stages
            .iter()
            .copied()
            .filter(|s| Stage::HISTORICAL.contains(s))
            .collect();

        let mut chunk_start = start;
        while chunk_start <= end {
            let chunk_end =
                (chunk_start + TimeDelta::days(BACKFILL_CHUNK_DAYS)).min(end + TimeDelta::days(1));
            let range = local_midnight(chunk_start, region.timezone)
                .and_then(|from| Ok((from, local_midnight(chunk_end, region.timezone)?)));

            for &stage in &stages {
                match &range {
                    Ok((from, to)) => {
                        let result = self.range_stage(stage, region, *from, *to);
                        report.record(stage, Some((*from, *to)), result);
                    }
                    Err(e) => report.record(stage, None, Err(anyhow!("{e:#}"))),
                }
            }
            chunk_start = chunk_end;
        }
        report
    }

    fn range_stage(
        &self,
        stage: Stage,
        region: &Region,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TableWrite>> {
        match stage {
            Stage::Generation => self.generation_stage(region, start, end),
            Stage::Load => {
                let load = self.grid.load(region, start, end).context("fetching load")?;
                Ok(vec![self.persist(region, tables::LOAD, &RecordBatch::from_table(&load))?])
            }
            Stage::Prices => {
                let prices = self.grid.prices(region, start, end).context("fetching prices")?;
                Ok(vec![self.persist(region, tables::PRICES, &RecordBatch::from_table(&prices))?])
            }
            Stage::Weather | Stage::Forecast | Stage::Windows => {
                bail!("{stage} does not run over a date range")
            }
        }
    }

    fn generation_stage(
        &self,
        region: &Region,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TableWrite>> {
        let (generation, emissions) = self.emissions(region, start, end)?;
        Ok(vec![
            self.persist(region, tables::GENERATION, &RecordBatch::from_table(&generation))?,
            self.persist(region, tables::EMISSIONS, &RecordBatch::from_table(&emissions))?,
        ])
    }

    /// Mapped generation and the emissions derived from it.
    fn emissions(
        &self,
        region: &Region,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(TimeTable, TimeTable)> {
        let snapshot = self
            .grid
            .generation(region, start, end)
            .context("fetching generation")?;
        let generation = map_generation(&snapshot).context("mapping generation categories")?;
        let emissions = calculate_emissions(&generation, &self.options.factors)
            .context("calculating emissions")?;
        Ok((generation, emissions))
    }

    fn weather_stage(&self, region: &Region) -> Result<Vec<TableWrite>> {
        let forecast = self
            .weather
            .forecast(region, self.options.forecast.horizon_days)
            .context("fetching weather forecast")?;
        Ok(vec![self.persist(region, tables::WEATHER, &RecordBatch::from_table(&forecast))?])
    }

    fn forecast_stage(&self, region: &Region, now: DateTime<Utc>) -> Result<Vec<TableWrite>> {
        let config = &self.options.forecast;
        let training = self.training_table(region, now)?;
        let inference = self
            .weather
            .forecast(region, config.horizon_days)
            .context("fetching weather forecast")?;
        let inference = add_calendar_features(&inference, region.timezone)?;

        let forecast = train_and_predict(&training, &inference, config)
            .with_context(|| format!("forecasting carbon intensity for {}", region.code))?;
        debug!(region = %region.code, rows = forecast.len(), "Forecast produced");

        Ok(vec![self.persist(region, tables::FORECAST, &RecordBatch::from_table(&forecast))?])
    }

    /// Emissions of the trailing training window on a complete hourly grid,
    /// joined with the weather history of the same hours.
    fn training_table(&self, region: &Region, now: DateTime<Utc>) -> Result<TimeTable> {
        let (start, end) = training_range(now, self.options.forecast.training_days);
        let (_, emissions) = self.emissions(region, start, end)?;
        let emissions = emissions.reindex_hourly();

        let tz = region.timezone;
        let mut days = Vec::new();
        let mut date = start.with_timezone(&tz).date_naive();
        let last = end.with_timezone(&tz).date_naive();
        while date <= last {
            let day = self
                .weather
                .history(region, date)
                .with_context(|| format!("fetching weather history for {date}"))?;
            days.push(day);
            date += TimeDelta::days(1);
        }
        let history = TimeTable::concat(&days);

        debug!(
            region = %region.code,
            emission_rows = emissions.len(),
            weather_rows = history.len(),
            "Training table assembled"
        );
        Ok(add_calendar_features(&emissions.left_join(&history), tz)?)
    }

    fn windows_stage(&self, region: &Region, now: DateTime<Utc>) -> Result<Vec<TableWrite>> {
        let tz = region.timezone;
        let today = now.with_timezone(&tz).date_naive();
        let from = local_midnight(today, tz)?;
        let to = from + TimeDelta::days(i64::from(self.options.forecast.horizon_days) + 1);

        let forecast = self.stored_table(region, tables::FORECAST, from, to)?;
        if forecast.is_empty() {
            bail!("no stored forecast from {today} onwards");
        }

        let (start, end) = training_range(now, self.options.forecast.training_days);
        let history = self.stored_table(region, tables::EMISSIONS, start, end)?;
        let reference = history
            .has_column(CARBON_INTENSITY_COLUMN)
            .then(|| reference_intensity(&history, CARBON_INTENSITY_COLUMN))
            .transpose()?
            .flatten()
            .ok_or_else(|| anyhow!("no stored carbon intensity between {start} and {end}"))?;

        let days = find_low_carbon_windows(&forecast, PREDICTION_COLUMN, reference, tz)?;
        info!(region = %region.code, days = days.len(), reference, "Low-carbon windows found");
        Ok(vec![self.persist(region, tables::TIME_PERIODS, &windows_batch(&days)?)?])
    }

    fn stored_table(
        &self,
        region: &Region,
        base: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<TimeTable> {
        let table = self.options.naming.table(base);
        let batch = self
            .store
            .query_range(
                &table,
                &region.code,
                &RecordKey::Timestamp(from),
                &RecordKey::Timestamp(to),
            )
            .with_context(|| format!("reading {table}"))?;
        Ok(batch.to_table()?)
    }

    fn persist(&self, region: &Region, base: &str, batch: &RecordBatch) -> Result<TableWrite> {
        let table = self.options.naming.table(base);
        let outcome = reconcile(&self.store, &table, &region.code, batch, self.options.dedupe)
            .with_context(|| format!("reconciling {table}"))?;
        Ok(TableWrite { table, outcome })
    }
}

/// Start of yesterday to the end of today, local time.
fn live_range(tz: Tz, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let today = now.with_timezone(&tz).date_naive();
    let start = local_midnight(today - TimeDelta::days(1), tz)?;
    let end = local_midnight(today + TimeDelta::days(1), tz)?;
    Ok((start, end))
}

/// The `days` whole hours before `now`.
fn training_range(now: DateTime<Utc>, days: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = floor_hour(now);
    (end - TimeDelta::days(i64::from(days)), end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Sao_Paulo;
    use chrono_tz::Europe::Prague;

    #[test]
    fn test_local_midnight() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        assert_eq!(
            local_midnight(date, Prague).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 30, 22, 0, 0).unwrap()
        );

        // Clocks went from 00:00 to 01:00 on this day.
        let skipped = NaiveDate::from_ymd_opt(2018, 11, 4).unwrap();
        assert_eq!(
            local_midnight(skipped, Sao_Paulo).unwrap(),
            Utc.with_ymd_and_hms(2018, 11, 4, 3, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_live_range_covers_yesterday_and_today() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 10, 30, 0).unwrap();
        let (start, end) = live_range(Prague, now).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 6, 29, 22, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 7, 1, 22, 0, 0).unwrap());
    }

    #[test]
    fn test_training_range_ends_at_the_hour() {
        let now = Utc.with_ymd_and_hms(2024, 7, 8, 10, 30, 0).unwrap();
        let (start, end) = training_range(now, 7);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 7, 8, 10, 0, 0).unwrap());
    }
}
