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

//! ENTSO-E code lists.

/// Human-readable production type for a `psrType` code.
#[must_use]
pub fn psr_label(code: &str) -> Option<&'static str> {
    let label = match code {
        "B01" => "Biomass",
        "B02" => "Fossil Brown coal/Lignite",
        "B03" => "Fossil Coal-derived gas",
        "B04" => "Fossil Gas",
        "B05" => "Fossil Hard coal",
        "B06" => "Fossil Oil",
        "B07" => "Fossil Oil shale",
        "B08" => "Fossil Peat",
        "B09" => "Geothermal",
        "B10" => "Hydro Pumped Storage",
        "B11" => "Hydro Run-of-river and poundage",
        "B12" => "Hydro Water Reservoir",
        "B13" => "Marine",
        "B14" => "Nuclear",
        "B15" => "Other renewable",
        "B16" => "Solar",
        "B17" => "Waste",
        "B18" => "Wind Offshore",
        "B19" => "Wind Onshore",
        "B20" => "Other",
        _ => return None,
    };
    Some(label)
}

/// EIC bidding zone / control area code for an ISO 3166 country code.
#[must_use]
pub fn area_code(country: &str) -> Option<&'static str> {
    let code = match country.to_ascii_uppercase().as_str() {
        "AT" => "10YAT-APG------L",
        "BE" => "10YBE----------2",
        "BA" => "10YBA-JPCC-----D",
        "BG" => "10YCA-BULGARIA-R",
        "HR" => "10YHR-HEP------M",
        "CZ" => "10YCZ-CEPS-----N",
        "DK" => "10Y1001A1001A65H",
        "EE" => "10Y1001A1001A39I",
        "FI" => "10YFI-1--------U",
        "FR" => "10YFR-RTE------C",
        "DE" => "10Y1001A1001A83F",
        "GR" => "10YGR-HTSO-----Y",
        "HU" => "10YHU-MAVIR----U",
        "IE" => "10YIE-1001A00010",
        "IT" => "10YIT-GRTN-----B",
        "XK" => "10Y1001C--00100H",
        "LV" => "10YLV-1001A00074",
        "LT" => "10YLT-1001A0008Q",
        "LU" => "10YLU-CEGEDEL-NQ",
        "MD" => "10Y1001A1001A990",
        "ME" => "10YCS-CG-TSO---S",
        "NL" => "10YNL----------L",
        "MK" => "10YMK-MEPSO----8",
        "NO" => "10YNO-0--------C",
        "PL" => "10YPL-AREA-----S",
        "PT" => "10YPT-REN------W",
        "RO" => "10YRO-TEL------P",
        "RS" => "10YCS-SERBIATSOV",
        "SK" => "10YSK-SEPS-----K",
        "SI" => "10YSI-ELES-----O",
        "ES" => "10YES-REE------0",
        "SE" => "10YSE-1--------K",
        "CH" => "10YCH-SWISSGRIDZ",
        _ => return None,
    };
    Some(code)
}
