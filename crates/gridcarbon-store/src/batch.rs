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

//! Rows as they travel to and from the store.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use gridcarbon_core::TimeTable;

use crate::error::{Result, StoreError};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// How the rows of a table are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Hourly samples keyed by UTC timestamp
    Timestamp,
    /// Aggregate records keyed by calendar date
    Date,
}

impl KeyKind {
    /// Name of the key column in stored tables.
    #[must_use]
    pub fn column_name(self) -> &'static str {
        match self {
            Self::Timestamp => "time",
            Self::Date => "date",
        }
    }

    pub(crate) fn parse(self, text: &str) -> Option<RecordKey> {
        match self {
            Self::Timestamp => NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
                .ok()
                .map(|naive| RecordKey::Timestamp(naive.and_utc())),
            Self::Date => NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .map(RecordKey::Date),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
}

impl RecordKey {
    #[must_use]
    pub fn kind(&self) -> KeyKind {
        match self {
            Self::Timestamp(_) => KeyKind::Timestamp,
            Self::Date(_) => KeyKind::Date,
        }
    }

    /// Fixed-width text form; sorts the same way as the key itself.
    #[must_use]
    pub fn to_sql_text(&self) -> String {
        match self {
            Self::Timestamp(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
            Self::Date(date) => date.format(DATE_FORMAT).to_string(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql_text())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Real(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnValues {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Real(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// SQLite column type used when the column is created.
    #[must_use]
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Real(_) => "REAL",
            Self::Text(_) => "TEXT",
        }
    }

    fn select(&self, mask: &[bool]) -> Self {
        fn pick<T: Clone>(values: &[T], mask: &[bool]) -> Vec<T> {
            values
                .iter()
                .zip(mask)
                .filter_map(|(v, keep)| keep.then(|| v.clone()))
                .collect()
        }
        match self {
            Self::Real(v) => Self::Real(pick(v, mask)),
            Self::Text(v) => Self::Text(pick(v, mask)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchColumn {
    pub name: String,
    pub values: ColumnValues,
}

/// A set of rows sharing one key kind, with at most one row per key.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    kind: KeyKind,
    keys: Vec<RecordKey>,
    columns: Vec<BatchColumn>,
}

impl RecordBatch {
    pub fn new(kind: KeyKind, keys: Vec<RecordKey>) -> Result<Self> {
        if let Some(key) = keys.iter().find(|k| k.kind() != kind) {
            return Err(StoreError::InvalidBatch(format!(
                "key {key} does not match the batch key kind {kind:?}"
            )));
        }
        let mut seen = HashSet::with_capacity(keys.len());
        if let Some(key) = keys.iter().find(|k| !seen.insert(**k)) {
            return Err(StoreError::InvalidBatch(format!("duplicate key {key}")));
        }
        Ok(Self {
            kind,
            keys,
            columns: Vec::new(),
        })
    }

    /// Timestamp-keyed batch carrying every column of `table`.
    #[must_use]
    pub fn from_table(table: &TimeTable) -> Self {
        Self {
            kind: KeyKind::Timestamp,
            keys: table.index().iter().copied().map(RecordKey::Timestamp).collect(),
            columns: table
                .columns()
                .iter()
                .map(|c| BatchColumn {
                    name: c.name.clone(),
                    values: ColumnValues::Real(c.values.clone()),
                })
                .collect(),
        }
    }

    pub fn push_column(&mut self, name: impl Into<String>, values: ColumnValues) -> Result<()> {
        let name = name.into();
        if values.len() != self.keys.len() {
            return Err(StoreError::InvalidBatch(format!(
                "column '{name}' has {} values for {} keys",
                values.len(),
                self.keys.len()
            )));
        }
        if self.columns.iter().any(|c| c.name == name) {
            return Err(StoreError::InvalidBatch(format!("duplicate column '{name}'")));
        }
        self.columns.push(BatchColumn { name, values });
        Ok(())
    }

    #[must_use]
    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    #[must_use]
    pub fn keys(&self) -> &[RecordKey] {
        &self.keys
    }

    #[must_use]
    pub fn columns(&self) -> &[BatchColumn] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnValues> {
        self.columns.iter().find(|c| c.name == name).map(|c| &c.values)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Smallest and largest key, if any.
    #[must_use]
    pub fn key_range(&self) -> Option<(RecordKey, RecordKey)> {
        let min = self.keys.iter().min()?;
        let max = self.keys.iter().max()?;
        Some((*min, *max))
    }

    /// Keep the rows whose key satisfies `keep`, with all columns.
    #[must_use]
    pub fn retain_keys<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&RecordKey) -> bool,
    {
        let mask: Vec<bool> = self.keys.iter().map(&mut keep).collect();
        Self {
            kind: self.kind,
            keys: self
                .keys
                .iter()
                .zip(&mask)
                .filter_map(|(k, keep)| keep.then_some(*k))
                .collect(),
            columns: self
                .columns
                .iter()
                .map(|c| BatchColumn {
                    name: c.name.clone(),
                    values: c.values.select(&mask),
                })
                .collect(),
        }
    }

    /// Back to a [`TimeTable`]; only timestamp-keyed batches of numeric
    /// columns convert. Rows are sorted by key.
    pub fn to_table(&self) -> Result<TimeTable> {
        if self.kind != KeyKind::Timestamp {
            return Err(StoreError::InvalidBatch(
                "only timestamp-keyed batches convert to a time table".to_owned(),
            ));
        }

        let mut order: Vec<usize> = (0..self.keys.len()).collect();
        order.sort_by_key(|&i| self.keys[i]);

        let index: Vec<DateTime<Utc>> = order
            .iter()
            .filter_map(|&i| match self.keys[i] {
                RecordKey::Timestamp(ts) => Some(ts),
                RecordKey::Date(_) => None,
            })
            .collect();
        let mut table =
            TimeTable::new(index).map_err(|e| StoreError::InvalidBatch(e.to_string()))?;

        for column in &self.columns {
            let ColumnValues::Real(values) = &column.values else {
                continue;
            };
            let sorted = order.iter().map(|&i| values[i]).collect();
            table
                .set_column(column.name.clone(), sorted)
                .map_err(|e| StoreError::InvalidBatch(e.to_string()))?;
        }
        Ok(table)
    }
}
