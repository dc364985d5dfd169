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

//! Transparency platform market documents.
//!
//! Only the elements needed to rebuild time series are modelled; everything
//! else in the payload is ignored.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;

use super::codes::psr_label;
use crate::error::{FetchError, Result};

/// Second header level of generation series produced in the area.
pub const AGGREGATED: &str = "Actual Aggregated";
/// Second header level of generation series consumed in the area (pumping).
pub const CONSUMPTION: &str = "Actual Consumption";

/// A03 curves omit points whose value repeats the previous one.
const VARIABLE_BLOCK_CURVE: &str = "A03";

#[derive(Debug, Deserialize)]
struct MarketDocument {
    #[serde(rename = "TimeSeries", default)]
    time_series: Vec<TimeSeries>,
}

#[derive(Debug, Deserialize)]
struct TimeSeries {
    #[serde(rename = "curveType", default)]
    curve_type: Option<String>,
    #[serde(rename = "outBiddingZone_Domain.mRID", default)]
    out_domain: Option<Domain>,
    #[serde(rename = "MktPSRType", default)]
    psr: Option<PsrType>,
    #[serde(rename = "Period", default)]
    periods: Vec<Period>,
}

#[derive(Debug, Deserialize)]
struct Domain {
    #[serde(rename = "$text")]
    code: String,
}

#[derive(Debug, Deserialize)]
struct PsrType {
    #[serde(rename = "psrType")]
    code: String,
}

#[derive(Debug, Deserialize)]
struct Period {
    #[serde(rename = "timeInterval")]
    interval: TimeInterval,
    resolution: String,
    #[serde(rename = "Point", default)]
    points: Vec<Point>,
}

#[derive(Debug, Deserialize)]
struct TimeInterval {
    start: String,
    end: String,
}

#[derive(Debug, Deserialize)]
struct Point {
    position: u32,
    #[serde(default)]
    quantity: Option<f64>,
    #[serde(rename = "price.amount", default)]
    price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Acknowledgement {
    #[serde(rename = "Reason", default)]
    reasons: Vec<Reason>,
}

#[derive(Debug, Deserialize)]
struct Reason {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Which value a point carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Quantity,
    Price,
}

fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%MZ")
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(text).map(|ts| ts.with_timezone(&Utc)))
        .map_err(|e| FetchError::Malformed(format!("bad timestamp '{text}': {e}")))
}

/// `PT15M`, `PT60M`, `PT1H`, ...
fn parse_resolution(text: &str) -> Result<TimeDelta> {
    let malformed = || FetchError::Malformed(format!("unsupported resolution '{text}'"));
    let body = text
        .strip_prefix("PT")
        .filter(|body| body.is_ascii())
        .ok_or_else(malformed)?;

    let (amount, unit) = body.split_at(body.len().saturating_sub(1));
    let amount: i64 = amount.parse().map_err(|_| malformed())?;
    let step = match unit {
        "M" => TimeDelta::minutes(amount),
        "H" => TimeDelta::hours(amount),
        _ => return Err(malformed()),
    };
    if step <= TimeDelta::zero() {
        return Err(malformed());
    }
    Ok(step)
}

impl Period {
    fn expand(
        &self,
        measure: Measure,
        fill_forward: bool,
        out: &mut BTreeMap<DateTime<Utc>, f64>,
    ) -> Result<()> {
        let start = parse_time(&self.interval.start)?;
        let end = parse_time(&self.interval.end)?;
        let step = parse_resolution(&self.resolution)?;

        let by_position: BTreeMap<u32, f64> = self
            .points
            .iter()
            .filter_map(|p| {
                let value = match measure {
                    Measure::Quantity => p.quantity,
                    Measure::Price => p.price,
                };
                value.map(|v| (p.position, v))
            })
            .collect();

        let mut ts = start;
        let mut position = 1;
        let mut last = None;
        while ts < end {
            let value = match by_position.get(&position) {
                Some(value) => Some(*value),
                None if fill_forward => last,
                None => None,
            };
            if let Some(value) = value {
                out.insert(ts, value);
                last = Some(value);
            }
            ts += step;
            position += 1;
        }
        Ok(())
    }
}

fn parse_document(xml: &str) -> Result<MarketDocument> {
    if xml.contains("Acknowledgement_MarketDocument") {
        let ack: Acknowledgement =
            from_str(xml).map_err(|e| FetchError::Malformed(format!("acknowledgement: {e}")))?;
        let reason = ack
            .reasons
            .iter()
            .filter_map(|r| r.text.clone().or_else(|| r.code.clone()))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(FetchError::NoData(reason));
    }
    from_str(xml).map_err(|e| FetchError::Malformed(e.to_string()))
}

fn expand_series(series: &TimeSeries, measure: Measure) -> Result<BTreeMap<DateTime<Utc>, f64>> {
    let fill_forward = series.curve_type.as_deref() == Some(VARIABLE_BLOCK_CURVE);
    let mut values = BTreeMap::new();
    for period in &series.periods {
        period.expand(measure, fill_forward, &mut values)?;
    }
    Ok(values)
}

/// Generation per production type, labelled `(production type, direction)`.
/// Produced series come before consumed ones of the same type.
pub fn parse_generation(
    xml: &str,
) -> Result<Vec<(String, Option<String>, BTreeMap<DateTime<Utc>, f64>)>> {
    let document = parse_document(xml)?;

    // (psr code, consumed) keeps B01..B20 order with produced first.
    let mut merged: BTreeMap<(String, bool), BTreeMap<DateTime<Utc>, f64>> = BTreeMap::new();
    for series in &document.time_series {
        let Some(psr) = &series.psr else {
            continue;
        };
        let consumed = series.out_domain.as_ref().is_some_and(|d| !d.code.is_empty());
        merged
            .entry((psr.code.clone(), consumed))
            .or_default()
            .extend(expand_series(series, Measure::Quantity)?);
    }

    Ok(merged
        .into_iter()
        .map(|((code, consumed), values)| {
            let label = psr_label(&code).map_or(code, str::to_owned);
            let direction = if consumed { CONSUMPTION } else { AGGREGATED };
            (label, Some(direction.to_owned()), values)
        })
        .collect())
}

/// All series of the document merged into one, e.g. total load or prices.
pub fn parse_single_series(xml: &str, measure: Measure) -> Result<BTreeMap<DateTime<Utc>, f64>> {
    let document = parse_document(xml)?;
    let mut values = BTreeMap::new();
    for series in &document.time_series {
        values.extend(expand_series(series, measure)?);
    }
    if values.is_empty() {
        return Err(FetchError::NoData("document contains no points".to_owned()));
    }
    Ok(values)
}
