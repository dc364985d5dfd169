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

//! GridCarbon pipeline
//!
//! One run for one region: fetch, transform, forecast and reconcile every
//! table into the store. Stages are independent; a failing stage is logged
//! and reported and the run carries on with the next one.
//!
//! The same [`Pipeline`] serves live runs and historical backfills; they
//! differ only in [`PipelineOptions`] (table naming, dedupe strategy).

pub mod options;
pub mod report;
pub mod runner;
pub mod windows;

pub use options::{PipelineOptions, TableNaming, tables};
pub use report::{RunReport, Stage, StageReport, StageStatus, TableWrite};
pub use runner::{BACKFILL_CHUNK_DAYS, Pipeline, local_midnight};
pub use windows::windows_batch;
