//! Generic row access for replicated tables.
//!
//! Replicated tables belong to the host application, so their columns are
//! not known at compile time. Everything here works on [`Record`]s read
//! with `SELECT *` and on identifiers quoted with [`quote_ident`].
//!
//! All functions take a plain `&Connection` so they can run inside a
//! transaction (`Transaction` derefs to `Connection`).

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Result, params_from_iter};

use crate::model::record::{SYNCED_AT, UPDATED_AT, timestamp_millis};
use crate::model::{Record, Timestamp};

/// Quote an SQL identifier (`"name"`, with embedded quotes doubled).
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Check whether a table exists.
///
/// # Errors
///
/// Returns an error if the catalog query fails.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?
        .exists([table])
}

/// Column names of a table, in declaration order.
///
/// # Errors
///
/// Returns an error if the catalog query fails.
pub fn column_names(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let names = stmt.query_map([table], |row| row.get(0))?.collect();
    names
}

/// Check whether a column exists in a table.
///
/// # Errors
///
/// Returns an error if the catalog query fails.
pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    conn.prepare("SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2")?
        .exists([table, column])
}

/// Add a column to a table.
///
/// # Errors
///
/// Returns an error if the ALTER fails (including when the column exists).
pub fn add_column(conn: &Connection, table: &str, column: &str, declaration: &str) -> Result<()> {
    conn.execute(
        &format!(
            "ALTER TABLE {} ADD COLUMN {} {declaration}",
            quote_ident(table),
            quote_ident(column)
        ),
        [],
    )?;
    Ok(())
}

/// Run a `SELECT *`-style query and collect the rows as records.
fn select_records<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let records = stmt
        .query_map(params, |row| {
            let mut values = Vec::with_capacity(names.len());
            for (idx, name) in names.iter().enumerate() {
                values.push((name.clone(), row.get::<_, Value>(idx)?));
            }
            Ok(Record::new(values))
        })?
        .collect();
    records
}

/// Rows whose `updated_at` is strictly greater than `since` (Unix
/// milliseconds).
///
/// INTEGER timestamps are filtered in SQL. Rows stored in any other
/// encoding are compared after [`Timestamp`] normalisation, since SQLite
/// orders every TEXT value above every INTEGER.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn rows_updated_after(conn: &Connection, table: &str, since: i64) -> Result<Vec<Record>> {
    let updated_at = quote_ident(UPDATED_AT);
    let sql = format!(
        "SELECT * FROM {} WHERE typeof({updated_at}) <> 'integer' OR {updated_at} > ?1",
        quote_ident(table)
    );
    let rows = select_records(conn, &sql, [since])?;
    let since = Timestamp::Millis(since);
    Ok(rows.into_iter().filter(|row| row.last_write() > since).collect())
}

/// Rows changed since their own last reconciliation
/// (`updated_at > COALESCE(synced_at, 0)` after [`Timestamp`]
/// normalisation).
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn rows_pending_push(conn: &Connection, table: &str) -> Result<Vec<Record>> {
    let updated_at = quote_ident(UPDATED_AT);
    let synced_at = quote_ident(SYNCED_AT);
    let sql = format!(
        "SELECT * FROM {} WHERE typeof({updated_at}) <> 'integer' \
            OR typeof({synced_at}) NOT IN ('integer', 'null') \
            OR {updated_at} > COALESCE({synced_at}, 0)",
        quote_ident(table)
    );
    let rows = select_records(conn, &sql, [])?;
    Ok(rows
        .into_iter()
        .filter(|row| row.last_write() > row.last_synced())
        .collect())
}

/// Look up a row by primary key.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn find_by_key(
    conn: &Connection,
    table: &str,
    primary_key: &str,
    key: &Value,
) -> Result<Option<Record>> {
    let sql = format!(
        "SELECT * FROM {} WHERE {} = ?1",
        quote_ident(table),
        quote_ident(primary_key)
    );
    Ok(select_records(conn, &sql, [key])?.into_iter().next())
}

/// Table-wide high-water mark: the maximum `synced_at`, or 0 (epoch) if
/// no row has been reconciled yet.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn max_synced_at(conn: &Connection, table: &str) -> Result<i64> {
    let sql = format!(
        "SELECT MAX({}) FROM {}",
        quote_ident(SYNCED_AT),
        quote_ident(table)
    );
    let max: Option<Value> = conn.query_row(&sql, [], |row| row.get(0)).optional()?;
    Ok(max.as_ref().and_then(timestamp_millis).unwrap_or(0))
}

/// Insert a record verbatim.
///
/// # Errors
///
/// Returns an error if the insert fails (e.g. duplicate key, unknown column).
pub fn insert_record(conn: &Connection, table: &str, record: &Record) -> Result<()> {
    if record.values().is_empty() {
        return Ok(());
    }

    let columns = record.columns().map(quote_ident).collect::<Vec<_>>().join(", ");
    let placeholders = (1..=record.values().len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({columns}) VALUES ({placeholders})",
        quote_ident(table)
    );

    conn.execute(&sql, params_from_iter(record.values().iter().map(|(_, v)| v)))?;
    Ok(())
}

/// Overwrite every non-key column of the row identified by the record's
/// primary key. Returns the number of rows changed.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn update_record(conn: &Connection, table: &str, primary_key: &str, record: &Record) -> Result<usize> {
    let Some(key) = record.get(primary_key) else {
        return Ok(0);
    };

    let assignments: Vec<(&str, &Value)> = record
        .values()
        .iter()
        .filter(|(name, _)| name != primary_key)
        .map(|(name, value)| (name.as_str(), value))
        .collect();
    if assignments.is_empty() {
        return Ok(0);
    }

    let set_clause = assignments
        .iter()
        .enumerate()
        .map(|(i, (name, _))| format!("{} = ?{}", quote_ident(name), i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {} SET {set_clause} WHERE {} = ?{}",
        quote_ident(table),
        quote_ident(primary_key),
        assignments.len() + 1
    );

    let params = assignments.iter().map(|(_, value)| *value).chain(std::iter::once(key));
    conn.execute(&sql, params_from_iter(params))
}

/// Stamp one row's `synced_at`.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn mark_synced(conn: &Connection, table: &str, primary_key: &str, key: &Value, at: i64) -> Result<usize> {
    let sql = format!(
        "UPDATE {} SET {} = ?1 WHERE {} = ?2",
        quote_ident(table),
        quote_ident(SYNCED_AT),
        quote_ident(primary_key)
    );
    conn.execute(&sql, rusqlite::params![at, key])
}

/// Degraded bootstrap: create a table with one untyped column per column
/// of `sample`, declaring `primary_key` as the primary key.
///
/// Untyped columns keep each value's storage class, but the application's
/// declared types, defaults and constraints are lost.
///
/// # Errors
///
/// Returns an error if the CREATE fails.
pub fn create_table_from_sample(conn: &Connection, table: &str, primary_key: &str, sample: &Record) -> Result<()> {
    let mut columns: Vec<String> = Vec::new();
    if sample.get(primary_key).is_none() {
        columns.push(format!("{} PRIMARY KEY", quote_ident(primary_key)));
    }
    for name in sample.columns() {
        if name == primary_key {
            columns.push(format!("{} PRIMARY KEY", quote_ident(name)));
        } else {
            columns.push(quote_ident(name));
        }
    }

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(table),
            columns.join(", ")
        ),
        [],
    )?;
    Ok(())
}
