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

//! Emission accounting for category-mapped generation tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::category::{Category, TOTAL_COLUMN};
use crate::error::Result;
use crate::table::TimeTable;

/// Marks derived emission columns so they are never mistaken for generation.
pub const EMISSION_SUFFIX: &str = "_CEI";

pub const TOTAL_EMISSIONS_COLUMN: &str = "Total_CEI";
pub const CARBON_INTENSITY_COLUMN: &str = "Carbon_Intensity_CEI";

pub const DEFAULT_FACTORS_VERSION: &str = "lifecycle-2023";

/// MW over one hour → kWh
const KWH_PER_MWH: f64 = 1e3;
/// g → t
const GRAMS_PER_TONNE: f64 = 1e6;

/// Category → carbon intensity coefficient in gCO2eq/kWh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionFactors {
    version: String,
    factors: BTreeMap<Category, f64>,
}

impl Default for EmissionFactors {
    fn default() -> Self {
        let factors = Category::all()
            .iter()
            .map(|&c| (c, default_factor(c)))
            .collect();
        Self {
            version: DEFAULT_FACTORS_VERSION.to_owned(),
            factors,
        }
    }
}

fn default_factor(category: Category) -> f64 {
    match category {
        Category::Lignite | Category::Coal => 1104.0,
        Category::Gas => 515.0,
        Category::Oil => 1125.0,
        Category::Nuclear => 5.0,
        Category::Other | Category::Waste => 700.0,
        Category::Biomass => 230.0,
        Category::Geothermal => 38.0,
        Category::HydroStorage => 859.0,
        Category::Hydro | Category::HydroRes => 11.0,
        Category::OtherRenew => 300.0,
        Category::Solar => 35.0,
        Category::WindOff | Category::WindOn => 13.0,
    }
}

impl EmissionFactors {
    /// Built-in table with some coefficients replaced. Keys are category
    /// column names ("Gas", "Wind_on", ...).
    pub fn with_overrides<S: AsRef<str>>(
        version: impl Into<String>,
        overrides: impl IntoIterator<Item = (S, f64)>,
    ) -> Result<Self> {
        let mut table = Self::default();
        table.version = version.into();
        for (name, factor) in overrides {
            let category: Category = name.as_ref().parse()?;
            table.factors.insert(category, factor);
        }
        Ok(table)
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn factor(&self, category: Category) -> f64 {
        self.factors
            .get(&category)
            .copied()
            .unwrap_or_else(|| default_factor(category))
    }
}

/// Derive per-category emissions (tCO2eq per hourly row), their total and
/// the aggregate carbon intensity (gCO2eq/kWh) from a mapped generation table.
///
/// Intensity divides by the `Total` column of the mapped table, i.e. after
/// missing measurements were filled with zero. Rows with zero total
/// generation report an intensity of exactly `0.0`.
pub fn calculate_emissions(generation: &TimeTable, factors: &EmissionFactors) -> Result<TimeTable> {
    let mut emissions = TimeTable::new(generation.index().to_vec())?;
    let mut total = vec![0.0; generation.len()];

    for &category in Category::all() {
        let factor = factors.factor(category);
        let values: Vec<f64> = generation
            .require_column(category.column_name())?
            .iter()
            .map(|mw| mw.unwrap_or(0.0) * KWH_PER_MWH * factor / GRAMS_PER_TONNE)
            .collect();
        for (sum, value) in total.iter_mut().zip(&values) {
            *sum += value;
        }
        emissions.set_dense_column(format!("{}{EMISSION_SUFFIX}", category.column_name()), values)?;
    }

    let intensity = generation
        .require_column(TOTAL_COLUMN)?
        .iter()
        .zip(&total)
        .map(|(generated, emitted)| {
            let generated_kwh = generated.unwrap_or(0.0) * KWH_PER_MWH;
            if generated_kwh == 0.0 {
                0.0
            } else {
                let intensity = emitted * GRAMS_PER_TONNE / generated_kwh;
                if intensity.is_finite() { intensity } else { 0.0 }
            }
        })
        .collect();

    emissions.set_dense_column(TOTAL_EMISSIONS_COLUMN, total)?;
    emissions.set_dense_column(CARBON_INTENSITY_COLUMN, intensity)?;
    Ok(emissions)
}
