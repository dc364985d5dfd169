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

//! WeatherAPI.com forecast and history client.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use gridcarbon_core::{Region, TimeTable};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{FetchError, Result};
use crate::traits::WeatherSource;

pub const DEFAULT_BASE_URL: &str = "https://api.weatherapi.com/v1";
pub const API_KEY_ENV: &str = "API_KEY_WEATHERAPI";

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    forecast: ForecastBlock,
}

#[derive(Debug, Deserialize)]
struct ForecastBlock {
    #[serde(default)]
    forecastday: Vec<ForecastDay>,
}

#[derive(Debug, Deserialize)]
struct ForecastDay {
    #[serde(default)]
    hour: Vec<HourRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HourRecord {
    time: String,
    temp_c: Option<f64>,
    wind_kph: Option<f64>,
    wind_degree: Option<f64>,
    pressure_mb: Option<f64>,
    precip_mm: Option<f64>,
    humidity: Option<f64>,
    cloud: Option<f64>,
    feelslike_c: Option<f64>,
    windchill_c: Option<f64>,
    vis_km: Option<f64>,
    heatindex_c: Option<f64>,
    dewpoint_c: Option<f64>,
    gust_kph: Option<f64>,
    uv: Option<f64>,
    chance_of_rain: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

type Field = fn(&HourRecord) -> Option<f64>;

const FIELDS: [(&str, Field); 15] = [
    ("temp_c", |h| h.temp_c),
    ("wind_kph", |h| h.wind_kph),
    ("wind_degree", |h| h.wind_degree),
    ("pressure_mb", |h| h.pressure_mb),
    ("precip_mm", |h| h.precip_mm),
    ("humidity", |h| h.humidity),
    ("cloud", |h| h.cloud),
    ("feelslike_c", |h| h.feelslike_c),
    ("windchill_c", |h| h.windchill_c),
    ("vis_km", |h| h.vis_km),
    ("heatindex_c", |h| h.heatindex_c),
    ("dewpoint_c", |h| h.dewpoint_c),
    ("gust_kph", |h| h.gust_kph),
    ("uv", |h| h.uv),
    ("chance_of_rain", |h| h.chance_of_rain),
];

/// Columns of every weather table, in order.
pub const WEATHER_COLUMNS: [&str; 15] = {
    let mut names = [""; 15];
    let mut i = 0;
    while i < FIELDS.len() {
        names[i] = FIELDS[i].0;
        i += 1;
    }
    names
};

/// Local wall-clock hour to UTC. Ambiguous hours resolve to the earlier
/// instant; hours skipped by a DST change have no instant.
fn localize(time: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(time, "%Y-%m-%d %H:%M").ok()?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Turn a forecast/history payload into an hourly table in UTC.
fn parse_hours(body: &str, tz: Tz) -> Result<TimeTable> {
    let response: WeatherResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    let mut columns: Vec<BTreeMap<DateTime<Utc>, f64>> = vec![BTreeMap::new(); FIELDS.len()];
    let mut hours = 0;
    for record in response.forecast.forecastday.iter().flat_map(|d| &d.hour) {
        let Some(ts) = localize(&record.time, tz) else {
            warn!(time = %record.time, %tz, "Skipping weather hour without a UTC instant");
            continue;
        };
        hours += 1;
        for ((_, field), column) in FIELDS.iter().zip(&mut columns) {
            if let Some(value) = field(record) {
                column.insert(ts, value);
            }
        }
    }
    if hours == 0 {
        return Err(FetchError::NoData("weather payload contains no hours".to_owned()));
    }

    Ok(TimeTable::from_series(WEATHER_COLUMNS.into_iter().zip(columns)))
}

/// Blocking client for the WeatherAPI.com JSON API.
#[derive(Debug, Clone)]
pub struct WeatherApiClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl WeatherApiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Build from configuration values, falling back to the
    /// `API_KEY_WEATHERAPI` environment variable for the key.
    pub fn from_config(
        base_url: Option<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .ok_or(FetchError::MissingApiKey(API_KEY_ENV))?;
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());

        info!("Initializing WeatherAPI client: {}", base_url);
        Self::new(base_url, api_key, timeout)
    }

    fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<String> {
        let url = format!("{}/{endpoint}", self.base_url.trim_end_matches('/'));
        debug!(%url, ?params, "WeatherAPI request");

        let mut query: Vec<(&str, String)> = vec![("key", self.api_key.clone())];
        query.extend(params.iter().cloned());

        let response = self.client.get(&url).query(&query).send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(body)
    }
}

impl WeatherSource for WeatherApiClient {
    fn forecast(&self, region: &Region, days: u32) -> Result<TimeTable> {
        let body = self.get(
            "forecast.json",
            &[
                ("q", region.city.clone()),
                ("days", days.to_string()),
                ("aqi", "no".to_owned()),
            ],
        )?;
        let table = parse_hours(&body, region.timezone)?;
        info!(region = %region.code, rows = table.len(), "Fetched weather forecast");
        Ok(table)
    }

    fn history(&self, region: &Region, date: NaiveDate) -> Result<TimeTable> {
        let body = self.get(
            "history.json",
            &[
                ("q", region.city.clone()),
                ("dt", date.format("%Y-%m-%d").to_string()),
            ],
        )?;
        let table = parse_hours(&body, region.timezone)?;
        debug!(region = %region.code, %date, rows = table.len(), "Fetched weather history");
        Ok(table)
    }
}
