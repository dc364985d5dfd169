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

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use chrono::{DateTime, Utc};
use gridcarbon_store::ReconcileOutcome;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Independent unit of work of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Generation per category and the derived emissions
    Generation,
    Load,
    Prices,
    /// Weather forecast for the forecast horizon
    Weather,
    /// Carbon intensity forecast
    Forecast,
    /// Low-carbon windows from the stored forecast
    Windows,
}

impl Stage {
    /// Every stage, in run order.
    pub const ALL: [Stage; 6] = [
        Self::Generation,
        Self::Load,
        Self::Prices,
        Self::Weather,
        Self::Forecast,
        Self::Windows,
    ];

    /// Stages that make sense for a past date range.
    pub const HISTORICAL: [Stage; 3] = [Self::Generation, Self::Load, Self::Prices];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Load => "load",
            Self::Prices => "prices",
            Self::Weather => "weather",
            Self::Forecast => "forecast",
            Self::Windows => "windows",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        match Self::ALL.into_iter().find(|stage| stage.name() == normalized) {
            Some(stage) => Ok(stage),
            None => bail!(
                "unknown stage '{s}', expected one of: {}",
                Self::ALL.map(Stage::name).join(", ")
            ),
        }
    }
}

/// Result of reconciling one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableWrite {
    pub table: String,
    pub outcome: ReconcileOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Completed(Vec<TableWrite>),
    /// Full error chain of the failure
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    /// Time range the stage covered, for range-based stages
    pub range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub status: StageStatus,
}

impl StageReport {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.status, StageStatus::Failed(_))
    }

    #[must_use]
    pub fn rows_written(&self) -> usize {
        match &self.status {
            StageStatus::Completed(writes) => writes.iter().map(|w| w.outcome.written).sum(),
            StageStatus::Failed(_) => 0,
        }
    }
}

/// What happened to every stage of one region's run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub region: String,
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            stages: Vec::new(),
        }
    }

    /// Log and keep the result of one stage. Failures do not stop the run.
    pub fn record(
        &mut self,
        stage: Stage,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        result: anyhow::Result<Vec<TableWrite>>,
    ) {
        let status = match result {
            Ok(writes) => {
                let written: usize = writes.iter().map(|w| w.outcome.written).sum();
                info!(region = %self.region, %stage, tables = writes.len(), written, "Stage completed");
                StageStatus::Completed(writes)
            }
            Err(e) => {
                error!(region = %self.region, %stage, "Stage failed: {:#}", e);
                StageStatus::Failed(format!("{e:#}"))
            }
        };
        self.stages.push(StageReport {
            stage,
            range,
            status,
        });
    }

    pub fn failed_stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.stages.iter().filter(|s| s.is_failed()).map(|s| s.stage)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.stages.iter().all(|s| !s.is_failed())
    }

    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.stages.iter().map(StageReport::rows_written).sum()
    }

    /// Rows written into `table` across all stages.
    #[must_use]
    pub fn written_to(&self, table: &str) -> usize {
        self.stages
            .iter()
            .filter_map(|s| match &s.status {
                StageStatus::Completed(writes) => Some(writes),
                StageStatus::Failed(_) => None,
            })
            .flatten()
            .filter(|w| w.table == table)
            .map(|w| w.outcome.written)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_stage_from_str() {
        assert_eq!("Forecast".parse::<Stage>().unwrap(), Stage::Forecast);
        assert_eq!(" windows ".parse::<Stage>().unwrap(), Stage::Windows);
        let err = "emissions".parse::<Stage>().unwrap_err();
        assert!(err.to_string().contains("generation, load"));
    }

    #[test]
    fn test_report_keeps_failures_and_counts_rows() {
        let mut report = RunReport::new("CZ");
        report.record(
            Stage::Generation,
            None,
            Ok(vec![
                TableWrite {
                    table: "generation".to_owned(),
                    outcome: ReconcileOutcome {
                        candidates: 24,
                        existing: 0,
                        written: 24,
                    },
                },
                TableWrite {
                    table: "emissions".to_owned(),
                    outcome: ReconcileOutcome {
                        candidates: 24,
                        existing: 4,
                        written: 20,
                    },
                },
            ]),
        );
        report.record(
            Stage::Load,
            None,
            Err(anyhow!("503 Service Unavailable").context("fetching load")),
        );

        assert!(!report.is_success());
        assert_eq!(report.failed_stages().collect::<Vec<_>>(), vec![Stage::Load]);
        assert_eq!(report.rows_written(), 44);
        assert_eq!(report.written_to("emissions"), 20);
        assert_eq!(
            report.stages[1].status,
            StageStatus::Failed("fetching load: 503 Service Unavailable".to_owned())
        );
    }
}
