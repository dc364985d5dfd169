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

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A bidding region the pipeline runs for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// ISO 3166 alpha-2 code, also the region tag of stored records
    pub code: String,
    pub name: String,
    /// Location used for weather lookups
    pub city: String,
    pub timezone: Tz,
    /// ENTSO-E EIC area code override
    #[serde(default)]
    pub area: Option<String>,
}

impl Region {
    pub fn new(code: &str, name: &str, city: &str, timezone: Tz) -> Self {
        Self {
            code: code.to_owned(),
            name: name.to_owned(),
            city: city.to_owned(),
            timezone,
            area: None,
        }
    }
}

/// Built-in region list used when the configuration does not name any.
#[must_use]
pub fn european_regions() -> Vec<Region> {
    use chrono_tz::Europe;

    [
        ("AT", "Austria", "Vienna", Europe::Vienna),
        ("BE", "Belgium", "Brussels", Europe::Brussels),
        ("BA", "Bosnia and Herzegovina", "Sarajevo", Europe::Sarajevo),
        ("BG", "Bulgaria", "Sofia", Europe::Sofia),
        ("HR", "Croatia", "Zagreb", Europe::Zagreb),
        ("CZ", "Czech Republic", "Prague", Europe::Prague),
        ("DK", "Denmark", "Copenhagen", Europe::Copenhagen),
        ("EE", "Estonia", "Tallinn", Europe::Tallinn),
        ("FI", "Finland", "Helsinki", Europe::Helsinki),
        ("FR", "France", "Paris", Europe::Paris),
        ("DE", "Germany", "Berlin", Europe::Berlin),
        ("GR", "Greece", "Athens", Europe::Athens),
        ("HU", "Hungary", "Budapest", Europe::Budapest),
        ("IE", "Ireland", "Dublin", Europe::Dublin),
        ("IT", "Italy", "Rome", Europe::Rome),
        ("XK", "Kosovo", "Pristina", Europe::Belgrade),
        ("LV", "Latvia", "Riga", Europe::Riga),
        ("LT", "Lithuania", "Vilnius", Europe::Vilnius),
        ("LU", "Luxembourg", "Luxembourg", Europe::Luxembourg),
        ("MD", "Moldova", "Chisinau", Europe::Chisinau),
        ("ME", "Montenegro", "Podgorica", Europe::Podgorica),
        ("NL", "Netherlands", "Amsterdam", Europe::Amsterdam),
        ("MK", "North Macedonia", "Skopje", Europe::Skopje),
        ("NO", "Norway", "Oslo", Europe::Oslo),
        ("PL", "Poland", "Warsaw", Europe::Warsaw),
        ("PT", "Portugal", "Lisbon", Europe::Lisbon),
        ("RO", "Romania", "Bucharest", Europe::Bucharest),
        ("RS", "Serbia", "Belgrade", Europe::Belgrade),
        ("SK", "Slovakia", "Bratislava", Europe::Bratislava),
        ("SI", "Slovenia", "Ljubljana", Europe::Ljubljana),
        ("ES", "Spain", "Madrid", Europe::Madrid),
        ("SE", "Sweden", "Stockholm", Europe::Stockholm),
        ("CH", "Switzerland", "Bern", Europe::Zurich),
    ]
    .into_iter()
    .map(|(code, name, city, tz)| Region::new(code, name, city, tz))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_european_regions_have_unique_codes() {
        let regions = european_regions();
        assert_eq!(regions.len(), 33);

        let codes: HashSet<&str> = regions.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes.len(), regions.len());
    }
}
