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

//! Canonical generation categories and the raw → category mapping.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TableError};
use crate::table::TimeTable;

/// Bumped whenever a category is added, removed or relabelled.
pub const CATEGORY_SET_VERSION: u32 = 1;

pub const RENEWABLES_COLUMN: &str = "Renewables";
pub const NON_RENEWABLES_COLUMN: &str = "NonRenewables";
pub const TOTAL_COLUMN: &str = "Total";

/// Canonical generation technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Lignite,
    Gas,
    Coal,
    Oil,
    Nuclear,
    Other,
    Waste,
    Biomass,
    Geothermal,
    HydroStorage,
    Hydro,
    HydroRes,
    OtherRenew,
    Solar,
    WindOff,
    WindOn,
}

impl Category {
    /// All categories, non-renewables first. This is also the column order
    /// of a mapped generation table.
    #[must_use]
    pub fn all() -> &'static [Category] {
        &[
            Self::Lignite,
            Self::Gas,
            Self::Coal,
            Self::Oil,
            Self::Nuclear,
            Self::Other,
            Self::Waste,
            Self::Biomass,
            Self::Geothermal,
            Self::HydroStorage,
            Self::Hydro,
            Self::HydroRes,
            Self::OtherRenew,
            Self::Solar,
            Self::WindOff,
            Self::WindOn,
        ]
    }

    /// Column name in mapped tables and key in emission factor tables
    #[must_use]
    pub fn column_name(self) -> &'static str {
        match self {
            Self::Lignite => "Lignite",
            Self::Gas => "Gas",
            Self::Coal => "Coal",
            Self::Oil => "Oil",
            Self::Nuclear => "Nuclear",
            Self::Other => "Other",
            Self::Waste => "Waste",
            Self::Biomass => "Biomass",
            Self::Geothermal => "Geothermal",
            Self::HydroStorage => "Hydro_storage",
            Self::Hydro => "Hydro",
            Self::HydroRes => "Hydro_res",
            Self::OtherRenew => "Other_renew",
            Self::Solar => "Solar",
            Self::WindOff => "Wind_off",
            Self::WindOn => "Wind_on",
        }
    }

    /// Production type label as published by the transmission system operator
    #[must_use]
    pub fn source_label(self) -> &'static str {
        match self {
            Self::Lignite => "Fossil Brown coal/Lignite",
            Self::Gas => "Fossil Gas",
            Self::Coal => "Fossil Hard coal",
            Self::Oil => "Fossil Oil",
            Self::Nuclear => "Nuclear",
            Self::Other => "Other",
            Self::Waste => "Waste",
            Self::Biomass => "Biomass",
            Self::Geothermal => "Geothermal",
            Self::HydroStorage => "Hydro Pumped Storage",
            Self::Hydro => "Hydro Run-of-river and poundage",
            Self::HydroRes => "Hydro Water Reservoir",
            Self::OtherRenew => "Other renewable",
            Self::Solar => "Solar",
            Self::WindOff => "Wind Offshore",
            Self::WindOn => "Wind Onshore",
        }
    }

    #[must_use]
    pub fn is_renewable(self) -> bool {
        matches!(
            self,
            Self::Biomass
                | Self::Geothermal
                | Self::HydroStorage
                | Self::Hydro
                | Self::HydroRes
                | Self::OtherRenew
                | Self::Solar
                | Self::WindOff
                | Self::WindOn
        )
    }

    pub fn renewables() -> impl Iterator<Item = Category> {
        Self::all().iter().copied().filter(|c| c.is_renewable())
    }

    pub fn non_renewables() -> impl Iterator<Item = Category> {
        Self::all().iter().copied().filter(|c| !c.is_renewable())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for Category {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|c| c.column_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| TableError::UnknownCategory(s.to_owned()))
    }
}

/// One raw production series. `sub_label` carries the second header level
/// (e.g. "Actual Aggregated" vs "Actual Consumption") and is ignored by the
/// mapper.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSeries {
    pub label: String,
    pub sub_label: Option<String>,
    pub values: Vec<Option<f64>>,
}

/// Raw per-technology power output (MW) for one region and interval.
/// Labels may repeat; nothing is deduplicated at this stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationSnapshot {
    index: Vec<DateTime<Utc>>,
    series: Vec<RawSeries>,
}

impl GenerationSnapshot {
    /// Assemble a snapshot from independently indexed series, aligned on
    /// the union of their timestamps.
    #[must_use]
    pub fn from_labelled(
        series: Vec<(String, Option<String>, BTreeMap<DateTime<Utc>, f64>)>,
    ) -> Self {
        let index: Vec<DateTime<Utc>> = series
            .iter()
            .flat_map(|(_, _, values)| values.keys().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let series = series
            .into_iter()
            .map(|(label, sub_label, values)| RawSeries {
                label,
                sub_label,
                values: index.iter().map(|ts| values.get(ts).copied()).collect(),
            })
            .collect();

        Self { index, series }
    }

    #[must_use]
    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    #[must_use]
    pub fn series(&self) -> &[RawSeries] {
        &self.series
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Collapse to a table keyed by top-level label. Deduplication is
    /// positional: the first series carrying a label wins.
    pub fn to_table(&self) -> Result<TimeTable> {
        let mut seen = HashSet::new();
        let mut table = TimeTable::new(self.index.clone())?;
        for series in &self.series {
            if !seen.insert(series.label.as_str()) {
                debug!(label = %series.label, "dropping duplicate generation series");
                continue;
            }
            table.set_column(series.label.clone(), series.values.clone())?;
        }
        Ok(table)
    }
}

/// Map a raw generation snapshot onto the canonical category set.
///
/// The output has one column per [`Category`] (absent categories and missing
/// measurements are `0.0`) followed by `Renewables`, `NonRenewables` and
/// `Total`. Sub-hourly input is averaged into hourly buckets first.
pub fn map_generation(snapshot: &GenerationSnapshot) -> Result<TimeTable> {
    let mut raw = snapshot.to_table()?;
    if raw.min_step().is_some_and(|step| step < TimeDelta::hours(1)) {
        debug!(rows = raw.len(), "resampling sub-hourly generation to hourly means");
        raw = raw.resample_hourly_mean();
    }

    let mut mapped = TimeTable::new(raw.index().to_vec())?;
    for category in Category::all() {
        let values = match raw.column(category.source_label()) {
            Some(values) => values.iter().map(|v| v.unwrap_or(0.0)).collect(),
            None => vec![0.0; raw.len()],
        };
        mapped.set_dense_column(category.column_name(), values)?;
    }

    let renewable: Vec<&str> = Category::renewables().map(Category::column_name).collect();
    let non_renewable: Vec<&str> = Category::non_renewables().map(Category::column_name).collect();

    let renewables = mapped.row_sum(&renewable)?;
    let non_renewables = mapped.row_sum(&non_renewable)?;
    let total = non_renewables
        .iter()
        .zip(&renewables)
        .map(|(n, r)| n + r)
        .collect();

    mapped.set_dense_column(RENEWABLES_COLUMN, renewables)?;
    mapped.set_dense_column(NON_RENEWABLES_COLUMN, non_renewables)?;
    mapped.set_dense_column(TOTAL_COLUMN, total)?;
    Ok(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, hour, minute, 0).unwrap()
    }

    fn series(label: &str, points: &[(DateTime<Utc>, f64)]) -> (String, Option<String>, BTreeMap<DateTime<Utc>, f64>) {
        (
            label.to_owned(),
            Some("Actual Aggregated".to_owned()),
            points.iter().copied().collect(),
        )
    }

    #[test]
    fn test_categories_partition_into_two_groups() {
        let renewables: Vec<_> = Category::renewables().collect();
        let non_renewables: Vec<_> = Category::non_renewables().collect();

        assert_eq!(renewables.len() + non_renewables.len(), Category::all().len());
        assert!(renewables.iter().all(|c| !non_renewables.contains(c)));
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("Wind_on".parse::<Category>().unwrap(), Category::WindOn);
        assert_eq!("hydro_storage".parse::<Category>().unwrap(), Category::HydroStorage);
        assert!("Fusion".parse::<Category>().is_err());
    }

    #[test]
    fn test_every_category_present_and_absent_ones_zero() {
        let snapshot = GenerationSnapshot::from_labelled(vec![
            series("Solar", &[(ts(10, 0), 100.0)]),
            series("Fossil Gas", &[(ts(10, 0), 50.0)]),
        ]);

        let mapped = map_generation(&snapshot).unwrap();
        for category in Category::all() {
            let column = mapped.column(category.column_name()).unwrap();
            assert_eq!(column.len(), 1);
            assert!(column[0].is_some());
        }
        assert_eq!(mapped.value(0, "Solar"), Some(100.0));
        assert_eq!(mapped.value(0, "Gas"), Some(50.0));
        assert_eq!(mapped.value(0, "Nuclear"), Some(0.0));
        assert_eq!(mapped.value(0, RENEWABLES_COLUMN), Some(100.0));
        assert_eq!(mapped.value(0, NON_RENEWABLES_COLUMN), Some(50.0));
        assert_eq!(mapped.value(0, TOTAL_COLUMN), Some(150.0));
    }

    #[test]
    fn test_missing_measurements_become_zero() {
        let snapshot = GenerationSnapshot::from_labelled(vec![
            series("Solar", &[(ts(10, 0), 10.0)]),
            series("Nuclear", &[(ts(11, 0), 400.0)]),
        ]);

        let mapped = map_generation(&snapshot).unwrap();
        assert_eq!(mapped.column("Solar").unwrap(), &[Some(10.0), Some(0.0)]);
        assert_eq!(mapped.column("Nuclear").unwrap(), &[Some(0.0), Some(400.0)]);
    }

    #[test]
    fn test_duplicate_labels_keep_first_occurrence() {
        let mut consumption = series("Hydro Pumped Storage", &[(ts(10, 0), 999.0)]);
        consumption.1 = Some("Actual Consumption".to_owned());
        let snapshot = GenerationSnapshot::from_labelled(vec![
            series("Hydro Pumped Storage", &[(ts(10, 0), 30.0)]),
            consumption,
        ]);

        let mapped = map_generation(&snapshot).unwrap();
        assert_eq!(mapped.value(0, "Hydro_storage"), Some(30.0));
    }

    #[test]
    fn test_quarter_hour_input_is_averaged_hourly() {
        let snapshot = GenerationSnapshot::from_labelled(vec![series(
            "Wind Onshore",
            &[
                (ts(0, 0), 10.0),
                (ts(0, 15), 20.0),
                (ts(0, 30), 30.0),
                (ts(0, 45), 40.0),
                (ts(1, 0), 50.0),
            ],
        )]);

        let mapped = map_generation(&snapshot).unwrap();
        assert_eq!(mapped.index(), &[ts(0, 0), ts(1, 0)]);
        assert_eq!(mapped.column("Wind_on").unwrap(), &[Some(25.0), Some(50.0)]);
    }

    #[test]
    fn test_empty_snapshot_maps_to_empty_table() {
        let mapped = map_generation(&GenerationSnapshot::default()).unwrap();
        assert!(mapped.is_empty());
        assert!(mapped.has_column(TOTAL_COLUMN));
    }

    #[test]
    fn test_misaligned_series_is_an_error() {
        let snapshot = GenerationSnapshot {
            index: vec![ts(10, 0), ts(11, 0)],
            series: vec![RawSeries {
                label: "Solar".to_owned(),
                sub_label: None,
                values: vec![Some(1.0)],
            }],
        };

        assert!(matches!(
            snapshot.to_table(),
            Err(TableError::LengthMismatch { expected: 2, actual: 1, .. })
        ));
        assert!(map_generation(&snapshot).is_err());
    }
}
