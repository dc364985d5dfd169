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

//! ENTSO-E transparency platform REST client.

pub mod codes;
pub mod document;

use std::time::Duration;

use chrono::{DateTime, Utc};
use gridcarbon_core::{GenerationSnapshot, Region, TimeTable};
use reqwest::blocking::Client;
use tracing::{debug, info};

use self::document::{Measure, parse_generation, parse_single_series};
use crate::error::{FetchError, Result};
use crate::traits::{GridDataSource, LOAD_COLUMN, PRICE_COLUMN};

pub const DEFAULT_BASE_URL: &str = "https://web-api.tp.entsoe.eu/api";
pub const API_KEY_ENV: &str = "ENTSOE_API_KEY";

const PERIOD_FORMAT: &str = "%Y%m%d%H%M";

/// Blocking client for the transparency platform `/api` endpoint.
#[derive(Debug, Clone)]
pub struct EntsoeClient {
    base_url: String,
    token: String,
    client: Client,
}

impl EntsoeClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            token: token.into(),
            client,
        })
    }

    /// Build from configuration values, falling back to the
    /// `ENTSOE_API_KEY` environment variable for the token.
    pub fn from_config(
        base_url: Option<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let token = token
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .ok_or(FetchError::MissingApiKey(API_KEY_ENV))?;
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());

        info!("Initializing ENTSO-E client: {}", base_url);
        Self::new(base_url, token, timeout)
    }

    fn area(region: &Region) -> Result<String> {
        region
            .area
            .clone()
            .or_else(|| codes::area_code(&region.code).map(str::to_owned))
            .ok_or_else(|| FetchError::UnknownRegion(region.code.clone()))
    }

    fn get(
        &self,
        params: &[(&str, String)],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<String> {
        let mut query: Vec<(&str, String)> = vec![("securityToken", self.token.clone())];
        query.extend(params.iter().cloned());
        query.push(("periodStart", start.format(PERIOD_FORMAT).to_string()));
        query.push(("periodEnd", end.format(PERIOD_FORMAT).to_string()));

        debug!(url = %self.base_url, ?params, %start, %end, "ENTSO-E request");
        let response = self.client.get(&self.base_url).query(&query).send()?;
        let status = response.status();
        let body = response.text()?;

        // No-data answers arrive as acknowledgement documents, sometimes
        // with an error status; let the parser classify those.
        if !status.is_success() && !body.contains("Acknowledgement_MarketDocument") {
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }
        Ok(body)
    }
}

impl GridDataSource for EntsoeClient {
    fn generation(
        &self,
        region: &Region,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<GenerationSnapshot> {
        let area = Self::area(region)?;
        let xml = self.get(
            &[
                ("documentType", "A75".to_owned()),
                ("processType", "A16".to_owned()),
                ("in_Domain", area),
            ],
            start,
            end,
        )?;
        let series = parse_generation(&xml)?;
        if series.is_empty() {
            return Err(FetchError::NoData(format!("no generation series for {}", region.code)));
        }
        info!(region = %region.code, series = series.len(), "Fetched generation");
        Ok(GenerationSnapshot::from_labelled(series))
    }

    fn load(&self, region: &Region, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<TimeTable> {
        let area = Self::area(region)?;
        let xml = self.get(
            &[
                ("documentType", "A65".to_owned()),
                ("processType", "A16".to_owned()),
                ("outBiddingZone_Domain", area),
            ],
            start,
            end,
        )?;
        let values = parse_single_series(&xml, Measure::Quantity)?;
        info!(region = %region.code, rows = values.len(), "Fetched load");
        Ok(TimeTable::from_series([(LOAD_COLUMN, values)]))
    }

    fn prices(
        &self,
        region: &Region,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TimeTable> {
        let area = Self::area(region)?;
        let xml = self.get(
            &[
                ("documentType", "A44".to_owned()),
                ("in_Domain", area.clone()),
                ("out_Domain", area),
            ],
            start,
            end,
        )?;
        let values = parse_single_series(&xml, Measure::Price)?;
        info!(region = %region.code, rows = values.len(), "Fetched prices");
        Ok(TimeTable::from_series([(PRICE_COLUMN, values)]))
    }
}
