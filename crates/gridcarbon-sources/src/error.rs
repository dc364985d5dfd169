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

//! Error types for the sources crate

use thiserror::Error;

/// An upstream API was unreachable or answered with something unusable.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed upstream payload: {0}")]
    Malformed(String),

    #[error("no data available: {0}")]
    NoData(String),

    #[error("API key not configured (set {0})")]
    MissingApiKey(&'static str),

    #[error("no bidding zone known for region {0}")]
    UnknownRegion(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;
