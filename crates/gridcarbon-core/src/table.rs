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

//! Hourly, timestamp-indexed tables of named numeric columns.
//!
//! A [`TimeTable`] is the unit every transform consumes and produces. Its index
//! is strictly increasing (unique and sorted) and every column has exactly one
//! cell per index entry. Missing cells are `None`; nothing in this module
//! fills them implicitly.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, DurationRound, TimeDelta, Utc};

use crate::error::{Result, TableError};

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeTable {
    index: Vec<DateTime<Utc>>,
    columns: Vec<Column>,
}

/// Truncate a timestamp to the start of its hour.
#[must_use]
pub fn floor_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::hours(1)).unwrap_or(ts)
}

impl TimeTable {
    /// Create an empty table (no columns) over the given index.
    pub fn new(index: Vec<DateTime<Utc>>) -> Result<Self> {
        if let Some(pos) = index.windows(2).position(|w| w[0] >= w[1]) {
            return Err(if index[pos] == index[pos + 1] {
                TableError::DuplicateIndex(pos + 1)
            } else {
                TableError::UnsortedIndex(pos + 1)
            });
        }
        Ok(Self {
            index,
            columns: Vec::new(),
        })
    }

    /// Build a table from independently indexed series.
    ///
    /// The resulting index is the sorted union of all series timestamps; a
    /// series without a value at some timestamp gets `None` there. Later
    /// series with an already used name replace the earlier one.
    pub fn from_series<I, S>(series: I) -> Self
    where
        I: IntoIterator<Item = (S, BTreeMap<DateTime<Utc>, f64>)>,
        S: Into<String>,
    {
        let series: Vec<(String, BTreeMap<DateTime<Utc>, f64>)> = series
            .into_iter()
            .map(|(name, values)| (name.into(), values))
            .collect();

        let index: Vec<DateTime<Utc>> = series
            .iter()
            .flat_map(|(_, values)| values.keys().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut table = Self {
            index,
            columns: Vec::with_capacity(series.len()),
        };
        for (name, values) in series {
            let aligned = table.index.iter().map(|ts| values.get(ts).copied()).collect();
            table.put_column(name, aligned);
        }
        table
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn require_column(&self, name: &str) -> Result<&[Option<f64>]> {
        self.column(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_owned()))
    }

    #[must_use]
    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        self.column(name).and_then(|c| c.get(row).copied().flatten())
    }

    #[must_use]
    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.index.first().copied()
    }

    #[must_use]
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.index.last().copied()
    }

    /// Smallest gap between two consecutive index entries.
    #[must_use]
    pub fn min_step(&self) -> Option<TimeDelta> {
        self.index.windows(2).map(|w| w[1] - w[0]).min()
    }

    /// Insert or overwrite a column. Overwriting keeps the column position.
    pub fn set_column(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<()> {
        let name = name.into();
        if values.len() != self.index.len() {
            return Err(TableError::LengthMismatch {
                name,
                expected: self.index.len(),
                actual: values.len(),
            });
        }
        self.put_column(name, values);
        Ok(())
    }

    /// Same as [`Self::set_column`] for a column without missing cells.
    pub fn set_dense_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        self.set_column(name, values.into_iter().map(Some).collect())
    }

    fn put_column(&mut self, name: String, values: Vec<Option<f64>>) {
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(Column { name, values }),
        }
    }

    pub fn drop_column(&mut self, name: &str) {
        self.columns.retain(|c| c.name != name);
    }

    /// Replace every missing cell with `value`.
    pub fn fill_missing(&mut self, value: f64) {
        for column in &mut self.columns {
            for cell in column.values.iter_mut().filter(|c| c.is_none()) {
                *cell = Some(value);
            }
        }
    }

    /// Keep only the rows for which `keep` returns true.
    #[must_use]
    pub fn filter_rows<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(usize, DateTime<Utc>) -> bool,
    {
        let mask: Vec<bool> = self
            .index
            .iter()
            .enumerate()
            .map(|(row, ts)| keep(row, *ts))
            .collect();

        let pick = |values: &[Option<f64>]| -> Vec<Option<f64>> {
            values
                .iter()
                .zip(&mask)
                .filter_map(|(v, keep)| keep.then_some(*v))
                .collect()
        };

        Self {
            index: self
                .index
                .iter()
                .zip(&mask)
                .filter_map(|(ts, keep)| keep.then_some(*ts))
                .collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: pick(&c.values),
                })
                .collect(),
        }
    }

    /// Left join on the index: keeps this table's rows and appends the
    /// columns of `other` aligned by timestamp. Columns already present on the
    /// left side keep the left values.
    #[must_use]
    pub fn left_join(&self, other: &TimeTable) -> Self {
        let positions: HashMap<DateTime<Utc>, usize> = other
            .index
            .iter()
            .enumerate()
            .map(|(i, ts)| (*ts, i))
            .collect();

        let mut joined = self.clone();
        for column in &other.columns {
            if joined.has_column(&column.name) {
                continue;
            }
            let values = self
                .index
                .iter()
                .map(|ts| positions.get(ts).and_then(|&i| column.values[i]))
                .collect();
            joined.put_column(column.name.clone(), values);
        }
        joined
    }

    /// Average sub-hourly samples into hourly buckets keyed by the start of
    /// the hour. A bucket without any present sample stays missing.
    #[must_use]
    pub fn resample_hourly_mean(&self) -> Self {
        let mut buckets: Vec<(DateTime<Utc>, Vec<usize>)> = Vec::new();
        for (row, ts) in self.index.iter().enumerate() {
            let hour = floor_hour(*ts);
            match buckets.last_mut() {
                Some((last, rows)) if *last == hour => rows.push(row),
                _ => buckets.push((hour, vec![row])),
            }
        }

        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: buckets
                    .iter()
                    .map(|(_, rows)| {
                        let present: Vec<f64> = rows.iter().filter_map(|&r| c.values[r]).collect();
                        if present.is_empty() {
                            None
                        } else {
                            Some(present.iter().sum::<f64>() / present.len() as f64)
                        }
                    })
                    .collect(),
            })
            .collect();

        Self {
            index: buckets.into_iter().map(|(hour, _)| hour).collect(),
            columns,
        }
    }

    /// Expand the index to every hour between the first and last timestamp.
    /// Hours that were absent become rows of missing cells, so gaps are
    /// explicit instead of silently shifting alignment.
    #[must_use]
    pub fn reindex_hourly(&self) -> Self {
        let (Some(first), Some(last)) = (self.first_timestamp(), self.last_timestamp()) else {
            return self.clone();
        };

        let mut index = Vec::new();
        let mut ts = floor_hour(first);
        while ts <= last {
            index.push(ts);
            ts += TimeDelta::hours(1);
        }

        let positions: HashMap<DateTime<Utc>, usize> = self
            .index
            .iter()
            .enumerate()
            .map(|(i, ts)| (*ts, i))
            .collect();

        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: index
                    .iter()
                    .map(|ts| positions.get(ts).and_then(|&i| c.values[i]))
                    .collect(),
            })
            .collect();

        Self { index, columns }
    }

    /// Row-wise sum of the named columns, missing cells counting as zero.
    pub fn row_sum(&self, names: &[&str]) -> Result<Vec<f64>> {
        let mut sums = vec![0.0; self.len()];
        for name in names {
            let values = self.require_column(name)?;
            for (sum, value) in sums.iter_mut().zip(values) {
                *sum += value.unwrap_or(0.0);
            }
        }
        Ok(sums)
    }

    /// Stack tables row-wise. A timestamp present in several tables takes
    /// its cells from the last of them.
    #[must_use]
    pub fn concat(tables: &[TimeTable]) -> Self {
        let index: Vec<DateTime<Utc>> = tables
            .iter()
            .flat_map(|t| t.index.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut names: Vec<&str> = Vec::new();
        let mut cells: HashMap<&str, HashMap<DateTime<Utc>, Option<f64>>> = HashMap::new();
        for table in tables {
            for column in &table.columns {
                let name = column.name.as_str();
                if !cells.contains_key(name) {
                    names.push(name);
                }
                let by_time = cells.entry(name).or_default();
                for (ts, value) in table.index.iter().zip(&column.values) {
                    by_time.insert(*ts, *value);
                }
            }
        }

        let columns = names
            .into_iter()
            .map(|name| Column {
                name: name.to_owned(),
                values: index
                    .iter()
                    .map(|ts| cells.get(name).and_then(|c| c.get(ts).copied().flatten()))
                    .collect(),
            })
            .collect();

        Self { index, columns }
    }
}
