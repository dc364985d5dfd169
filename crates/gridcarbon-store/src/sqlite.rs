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

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, params, params_from_iter};
use tracing::debug;

use crate::batch::{BatchColumn, ColumnValues, KeyKind, RecordBatch, RecordKey};
use crate::error::{Result, StoreError};

/// Column holding the region tag in every stored table.
pub const REGION_COLUMN: &str = "region";

/// How rows whose (key, region) is already stored are treated on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Leave the stored row untouched
    InsertIfAbsent,
    /// Overwrite the stored row's columns with the new values
    Upsert,
}

/// Durable storage of region-tagged tables.
///
/// Implementations must make each [`RecordStore::write`] all-or-nothing.
pub trait RecordStore: Send + Sync {
    /// All rows of `table` tagged `region` whose key lies in `[from, to]`.
    /// A table that does not exist yet yields an empty batch.
    fn query_range(
        &self,
        table: &str,
        region: &str,
        from: &RecordKey,
        to: &RecordKey,
    ) -> Result<RecordBatch>;

    /// Write every row of `batch` under `region`, creating the table and any
    /// missing columns first. Returns the number of rows inserted or updated.
    fn write(
        &self,
        table: &str,
        region: &str,
        batch: &RecordBatch,
        mode: WriteMode,
    ) -> Result<usize>;
}

/// SQLite-backed [`RecordStore`]. Each table has the primary key
/// `(key, region)`, which backs the no-duplicate guarantee at storage level.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn validate_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_owned()))
    }
}

fn quote(name: &str) -> String {
    format!("\"{name}\"")
}

#[derive(Debug)]
struct TableColumn {
    name: String,
    sql_type: String,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::StoreUnavailable(format!(
                    "failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            StoreError::StoreUnavailable(format!("failed to open {}: {e}", path.display()))
        })?;
        Self::from_connection(conn)
    }

    /// Volatile store, mainly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::StoreUnavailable(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // Touch the file so an unusable path fails here, not on first write.
        conn.query_row("PRAGMA schema_version", [], |row| row.get::<_, i64>(0))
            .map_err(|e| StoreError::StoreUnavailable(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Names of the tables currently in the database.
    pub fn tables(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    /// Number of rows of `table` tagged `region`; 0 for an absent table.
    pub fn count(&self, table: &str, region: &str) -> Result<usize> {
        validate_identifier(table)?;
        let conn = self.conn.lock();
        if table_columns(&conn, table)?.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1",
            quote(table),
            quote(REGION_COLUMN)
        );
        let count: i64 = conn.query_row(&sql, params![region], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<TableColumn>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote(table)))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(TableColumn {
                name: row.get(1)?,
                sql_type: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

fn key_kind_of(table: &str, columns: &[TableColumn]) -> Result<KeyKind> {
    [KeyKind::Timestamp, KeyKind::Date]
        .into_iter()
        .find(|kind| columns.iter().any(|c| c.name == kind.column_name()))
        .ok_or_else(|| StoreError::SchemaMismatch {
            table: table.to_owned(),
            reason: "no time or date key column".to_owned(),
        })
}

/// Create `table` if needed and add the batch's columns it lacks.
fn ensure_schema(conn: &Connection, table: &str, batch: &RecordBatch) -> Result<()> {
    let key = batch.kind().column_name();
    let existing = table_columns(conn, table)?;

    if existing.is_empty() {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {t} (
                {k} TEXT NOT NULL,
                {r} TEXT NOT NULL,
                PRIMARY KEY ({k}, {r})
            );",
            t = quote(table),
            k = quote(key),
            r = quote(REGION_COLUMN),
        ))?;
        debug!(table, key, "Created table");
    } else if key_kind_of(table, &existing)? != batch.kind() {
        return Err(StoreError::SchemaMismatch {
            table: table.to_owned(),
            reason: format!("table is not keyed by '{key}'"),
        });
    }

    for BatchColumn { name, values } in batch.columns() {
        match existing.iter().find(|c| &c.name == name) {
            Some(column) if !column.sql_type.eq_ignore_ascii_case(values.sql_type()) => {
                return Err(StoreError::SchemaMismatch {
                    table: table.to_owned(),
                    reason: format!(
                        "column '{name}' is {} but the batch holds {}",
                        column.sql_type,
                        values.sql_type()
                    ),
                });
            }
            Some(_) => {}
            None => {
                conn.execute_batch(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    quote(table),
                    quote(name),
                    values.sql_type()
                ))?;
                debug!(table, column = %name, "Added column");
            }
        }
    }
    Ok(())
}

fn cell_value(values: &ColumnValues, row: usize) -> rusqlite::types::Value {
    use rusqlite::types::Value;
    match values {
        ColumnValues::Real(v) => v[row].filter(|x| x.is_finite()).map_or(Value::Null, Value::Real),
        ColumnValues::Text(v) => v[row].clone().map_or(Value::Null, Value::Text),
    }
}

impl RecordStore for SqliteStore {
    fn query_range(
        &self,
        table: &str,
        region: &str,
        from: &RecordKey,
        to: &RecordKey,
    ) -> Result<RecordBatch> {
        validate_identifier(table)?;
        let conn = self.conn.lock();
        let columns = table_columns(&conn, table)?;
        if columns.is_empty() {
            return RecordBatch::new(from.kind(), Vec::new());
        }

        let kind = key_kind_of(table, &columns)?;
        if kind != from.kind() || kind != to.kind() {
            return Err(StoreError::SchemaMismatch {
                table: table.to_owned(),
                reason: format!("queried with {:?} keys but keyed by '{}'", from.kind(), kind.column_name()),
            });
        }

        let value_columns: Vec<&TableColumn> = columns
            .iter()
            .filter(|c| c.name != kind.column_name() && c.name != REGION_COLUMN)
            .collect();
        let select_list: Vec<String> = std::iter::once(kind.column_name())
            .chain(value_columns.iter().map(|c| c.name.as_str()))
            .map(quote)
            .collect();
        let sql = format!(
            "SELECT {} FROM {} WHERE {r} = ?1 AND {k} BETWEEN ?2 AND ?3 ORDER BY {k}",
            select_list.join(", "),
            quote(table),
            r = quote(REGION_COLUMN),
            k = quote(kind.column_name()),
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![region, from.to_sql_text(), to.to_sql_text()])?;

        let mut keys = Vec::new();
        let mut cells: Vec<ColumnValues> = value_columns
            .iter()
            .map(|c| {
                if c.sql_type.eq_ignore_ascii_case("TEXT") {
                    ColumnValues::Text(Vec::new())
                } else {
                    ColumnValues::Real(Vec::new())
                }
            })
            .collect();

        while let Some(row) = rows.next()? {
            let raw_key: String = row.get(0)?;
            let key = kind.parse(&raw_key).ok_or_else(|| StoreError::SchemaMismatch {
                table: table.to_owned(),
                reason: format!("unparseable key '{raw_key}'"),
            })?;
            keys.push(key);
            for (i, column) in cells.iter_mut().enumerate() {
                match column {
                    ColumnValues::Real(v) => v.push(row.get::<_, Option<f64>>(i + 1)?),
                    ColumnValues::Text(v) => v.push(row.get::<_, Option<String>>(i + 1)?),
                }
            }
        }

        let mut batch = RecordBatch::new(kind, keys)?;
        for (column, values) in value_columns.iter().zip(cells) {
            batch.push_column(column.name.clone(), values)?;
        }
        Ok(batch)
    }

    fn write(
        &self,
        table: &str,
        region: &str,
        batch: &RecordBatch,
        mode: WriteMode,
    ) -> Result<usize> {
        validate_identifier(table)?;
        for column in batch.columns() {
            validate_identifier(&column.name)?;
            if column.name == REGION_COLUMN
                || column.name == KeyKind::Timestamp.column_name()
                || column.name == KeyKind::Date.column_name()
            {
                return Err(StoreError::InvalidIdentifier(column.name.clone()));
            }
        }
        if batch.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        ensure_schema(&tx, table, batch)?;

        let key = quote(batch.kind().column_name());
        let names: Vec<String> = std::iter::once(key.clone())
            .chain(std::iter::once(quote(REGION_COLUMN)))
            .chain(batch.columns().iter().map(|c| quote(&c.name)))
            .collect();
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
        let on_conflict = match mode {
            WriteMode::InsertIfAbsent => "DO NOTHING".to_owned(),
            WriteMode::Upsert if batch.columns().is_empty() => "DO NOTHING".to_owned(),
            WriteMode::Upsert => format!(
                "DO UPDATE SET {}",
                names[2..]
                    .iter()
                    .map(|n| format!("{n} = excluded.{n}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({key}, {}) {on_conflict}",
            quote(table),
            names.join(", "),
            placeholders.join(", "),
            quote(REGION_COLUMN),
        );

        let mut written = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for (row, record_key) in batch.keys().iter().enumerate() {
                use rusqlite::types::Value;
                let values = [
                    Value::Text(record_key.to_sql_text()),
                    Value::Text(region.to_owned()),
                ]
                .into_iter()
                .chain(batch.columns().iter().map(|c| cell_value(&c.values, row)));
                written += stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;

        debug!(table, region, rows = written, ?mode, "Batch written");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn ts(hour: u32) -> RecordKey {
        RecordKey::Timestamp(Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap())
    }

    fn batch(rows: &[(u32, f64)]) -> RecordBatch {
        let mut batch =
            RecordBatch::new(KeyKind::Timestamp, rows.iter().map(|(h, _)| ts(*h)).collect()).unwrap();
        batch
            .push_column("value", ColumnValues::Real(rows.iter().map(|(_, v)| Some(*v)).collect()))
            .unwrap();
        batch
    }

    fn all(store: &SqliteStore, table: &str, region: &str) -> RecordBatch {
        store.query_range(table, region, &ts(0), &ts(23)).unwrap()
    }

    #[test]
    fn test_write_then_query_range() {
        let store = SqliteStore::open_in_memory().unwrap();
        let written = store
            .write("load", "CZ", &batch(&[(1, 10.0), (2, 20.0), (3, 30.0)]), WriteMode::InsertIfAbsent)
            .unwrap();
        assert_eq!(written, 3);

        let rows = store.query_range("load", "CZ", &ts(2), &ts(3)).unwrap();
        assert_eq!(rows.keys(), &[ts(2), ts(3)]);
        assert_eq!(
            rows.column("value"),
            Some(&ColumnValues::Real(vec![Some(20.0), Some(30.0)]))
        );
    }

    #[test]
    fn test_query_is_scoped_to_region() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .write("load", "CZ", &batch(&[(1, 10.0)]), WriteMode::InsertIfAbsent)
            .unwrap();
        store
            .write("load", "SK", &batch(&[(1, 99.0)]), WriteMode::InsertIfAbsent)
            .unwrap();

        assert_eq!(all(&store, "load", "CZ").len(), 1);
        assert_eq!(store.count("load", "SK").unwrap(), 1);
        assert_eq!(store.count("load", "PL").unwrap(), 0);
    }

    #[test]
    fn test_missing_table_queries_empty() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rows = all(&store, "prices", "CZ");
        assert!(rows.is_empty());
        assert_eq!(store.count("prices", "CZ").unwrap(), 0);
    }

    #[test]
    fn test_insert_if_absent_keeps_stored_value() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .write("load", "CZ", &batch(&[(1, 10.0)]), WriteMode::InsertIfAbsent)
            .unwrap();
        let written = store
            .write("load", "CZ", &batch(&[(1, 11.0)]), WriteMode::InsertIfAbsent)
            .unwrap();

        assert_eq!(written, 0);
        assert_eq!(
            all(&store, "load", "CZ").column("value"),
            Some(&ColumnValues::Real(vec![Some(10.0)]))
        );
    }

    #[test]
    fn test_upsert_overwrites_stored_value() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .write("load", "CZ", &batch(&[(1, 10.0)]), WriteMode::InsertIfAbsent)
            .unwrap();
        store
            .write("load", "CZ", &batch(&[(1, 11.0), (2, 12.0)]), WriteMode::Upsert)
            .unwrap();

        assert_eq!(
            all(&store, "load", "CZ").column("value"),
            Some(&ColumnValues::Real(vec![Some(11.0), Some(12.0)]))
        );
    }

    #[test]
    fn test_new_columns_are_added() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .write("weather", "CZ", &batch(&[(1, 10.0)]), WriteMode::InsertIfAbsent)
            .unwrap();

        let mut wider = batch(&[(2, 20.0)]);
        wider
            .push_column("cloud", ColumnValues::Real(vec![Some(75.0)]))
            .unwrap();
        store
            .write("weather", "CZ", &wider, WriteMode::InsertIfAbsent)
            .unwrap();

        let rows = all(&store, "weather", "CZ");
        assert_eq!(
            rows.column("cloud"),
            Some(&ColumnValues::Real(vec![None, Some(75.0)]))
        );
    }

    #[test]
    fn test_failed_write_leaves_schema_and_rows_untouched() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .write("load", "CZ", &batch(&[(1, 10.0)]), WriteMode::InsertIfAbsent)
            .unwrap();

        // `extra` is added first, then `value` fails its type check.
        let mut mixed = RecordBatch::new(KeyKind::Timestamp, vec![ts(2)]).unwrap();
        mixed
            .push_column("extra", ColumnValues::Real(vec![Some(1.0)]))
            .unwrap();
        mixed
            .push_column("value", ColumnValues::Text(vec![Some("high".to_owned())]))
            .unwrap();
        let result = store.write("load", "CZ", &mixed, WriteMode::Upsert);
        assert!(matches!(result, Err(StoreError::SchemaMismatch { .. })));

        let columns: Vec<String> = table_columns(&store.conn.lock(), "load")
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(columns, vec!["time", "region", "value"]);
        assert_eq!(store.count("load", "CZ").unwrap(), 1);
    }

    #[test]
    fn test_date_keyed_tables() {
        let store = SqliteStore::open_in_memory().unwrap();
        let day = |d| RecordKey::Date(NaiveDate::from_ymd_opt(2024, 6, d).unwrap());
        let mut periods = RecordBatch::new(KeyKind::Date, vec![day(1), day(2)]).unwrap();
        periods
            .push_column(
                "first_start",
                ColumnValues::Text(vec![Some("2024-06-01T02:00:00Z".to_owned()), None]),
            )
            .unwrap();
        store
            .write("time_periods", "CZ", &periods, WriteMode::InsertIfAbsent)
            .unwrap();

        let rows = store
            .query_range("time_periods", "CZ", &day(1), &day(30))
            .unwrap();
        assert_eq!(rows.kind(), KeyKind::Date);
        assert_eq!(rows, periods);

        // A date-keyed table cannot take timestamp rows.
        let result = store.write("time_periods", "CZ", &batch(&[(1, 1.0)]), WriteMode::InsertIfAbsent);
        assert!(matches!(result, Err(StoreError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_invalid_identifiers_are_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = store.write("load; DROP TABLE x", "CZ", &batch(&[(1, 1.0)]), WriteMode::Upsert);
        assert!(matches!(result, Err(StoreError::InvalidIdentifier(_))));

        let mut bad = batch(&[(1, 1.0)]);
        bad.push_column("region", ColumnValues::Real(vec![None])).unwrap();
        let result = store.write("load", "CZ", &bad, WriteMode::Upsert);
        assert!(matches!(result, Err(StoreError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("gridcarbon.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .write("load", "CZ", &batch(&[(5, 50.0)]), WriteMode::InsertIfAbsent)
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.count("load", "CZ").unwrap(), 1);
        assert_eq!(store.tables().unwrap(), vec!["load".to_owned()]);
    }

    #[test]
    fn test_unusable_path_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        // A directory is not a database file.
        let result = SqliteStore::open(dir.path());
        assert!(matches!(result, Err(StoreError::StoreUnavailable(_))));
    }

    #[test]
    fn test_non_finite_values_are_stored_as_null() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut rows = RecordBatch::new(KeyKind::Timestamp, vec![ts(1)]).unwrap();
        rows.push_column("value", ColumnValues::Real(vec![Some(f64::NAN)]))
            .unwrap();
        store.write("load", "CZ", &rows, WriteMode::InsertIfAbsent).unwrap();

        assert_eq!(
            all(&store, "load", "CZ").column("value"),
            Some(&ColumnValues::Real(vec![None]))
        );
    }
}
