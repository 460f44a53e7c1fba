//! Replicated row model.
//!
//! A [`Record`] is one row of a replicated table, read generically with
//! `SELECT *`. Column order is preserved so a row can be written back
//! verbatim (and, in degraded mode, used as a schema sample).

use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use serde::Serialize;

/// Last-write timestamp column.
pub const UPDATED_AT: &str = "updated_at";
/// Identity of the last writer.
pub const UPDATED_BY: &str = "updated_by";
/// Timestamp of the last successful reconciliation of this row.
pub const SYNCED_AT: &str = "synced_at";

/// The three tracking columns every replicated table carries, with the
/// declaration used when adding them.
pub const TRACKING_COLUMNS: [(&str, &str); 3] = [
    (UPDATED_AT, "INTEGER"),
    (UPDATED_BY, "TEXT"),
    (SYNCED_AT, "INTEGER"),
];

/// A row from a replicated table.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<(String, Value)>,
}

impl Record {
    /// Build a record from `(column, value)` pairs in column order.
    #[must_use]
    pub fn new(values: Vec<(String, Value)>) -> Self {
        Self { values }
    }

    /// Value of a column, if the row has that column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Set (or append) a column value.
    pub fn set(&mut self, column: &str, value: Value) {
        match self.values.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => *slot = value,
            None => self.values.push((column.to_string(), value)),
        }
    }

    /// Column names in row order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    /// `(column, value)` pairs in row order.
    #[must_use]
    pub fn values(&self) -> &[(String, Value)] {
        &self.values
    }

    /// Keep only the columns accepted by `keep`.
    #[must_use]
    pub fn retain_columns<F>(mut self, keep: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        self.values.retain(|(name, _)| keep(name));
        self
    }

    /// The row's `updated_at`, as Unix milliseconds.
    #[must_use]
    pub fn updated_at(&self) -> Option<i64> {
        self.get(UPDATED_AT).and_then(timestamp_millis)
    }

    /// The row's `updated_at` for ordering; a missing value is the epoch.
    #[must_use]
    pub fn last_write(&self) -> Timestamp {
        self.get(UPDATED_AT).map_or(Timestamp::EPOCH, Timestamp::from_value)
    }

    /// The row's `synced_at` for ordering; a missing value is the epoch.
    #[must_use]
    pub fn last_synced(&self) -> Timestamp {
        self.get(SYNCED_AT).map_or(Timestamp::EPOCH, Timestamp::from_value)
    }

    /// JSON object view of the row, used for conflict snapshots.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .values
            .iter()
            .map(|(name, value)| (name.clone(), value_to_json(value)))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl Serialize for Record {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Julian day numbers `julianday()` produces for plausible dates.
const JULIAN_DAY_RANGE: std::ops::Range<f64> = 2_000_000.0..3_000_000.0;
/// Julian day of 1970-01-01T00:00:00Z.
const UNIX_EPOCH_JULIAN_DAY: f64 = 2_440_587.5;
const MILLIS_PER_DAY: f64 = 86_400_000.0;
/// Fractional values below this magnitude are Unix seconds.
const SECONDS_LIMIT: f64 = 1e11;

/// Date-time text layouts written by SQLite's `datetime()` and
/// `CURRENT_TIMESTAMP`, read as UTC.
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// A tracking-column value normalised for ordering.
///
/// INTEGER values and integer text are Unix milliseconds. REAL values and
/// decimal text keep their fraction: values in the Julian-day range are
/// `julianday()` output, other values below `1e11` are Unix seconds, and
/// larger values are milliseconds. RFC 3339 and SQLite date-time text
/// (`2024-06-01 10:00:00`) become milliseconds. NULL is the epoch.
///
/// Anything else keeps its raw value and orders the way SQLite orders
/// storage classes: every number sorts before any text, text before blobs.
#[derive(Debug, Clone)]
pub enum Timestamp {
    /// Whole Unix milliseconds.
    Millis(i64),
    /// Unix milliseconds with a fractional part.
    FractionalMillis(f64),
    /// Text that is neither a number nor a recognised date-time.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Timestamp {
    /// 1970-01-01T00:00:00Z, the value of a missing timestamp.
    pub const EPOCH: Self = Self::Millis(0);

    /// Normalise a stored value.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::EPOCH,
            Value::Integer(i) => Self::Millis(*i),
            Value::Real(f) => Self::FractionalMillis(real_to_millis(*f)),
            Value::Text(s) => Self::from_text(s),
            Value::Blob(b) => Self::Blob(b.clone()),
        }
    }

    fn from_text(raw: &str) -> Self {
        let s = raw.trim();
        if let Ok(millis) = s.parse::<i64>() {
            return Self::Millis(millis);
        }
        if let Ok(f) = s.parse::<f64>() {
            if f.is_finite() {
                return Self::FractionalMillis(real_to_millis(f));
            }
        }
        parse_datetime(s).map_or_else(|| Self::Text(raw.to_string()), Self::Millis)
    }

    /// Whole Unix milliseconds, `None` for text and blobs.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_millis(&self) -> Option<i64> {
        match self {
            Self::Millis(millis) => Some(*millis),
            Self::FractionalMillis(millis) => Some(millis.floor() as i64),
            Self::Text(_) | Self::Blob(_) => None,
        }
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Millis(_) | Self::FractionalMillis(_) => 0,
            Self::Text(_) => 1,
            Self::Blob(_) => 2,
        }
    }
}

impl Ord for Timestamp {
    #[allow(clippy::cast_precision_loss)]
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Millis(a), Self::Millis(b)) => a.cmp(b),
            (Self::Millis(a), Self::FractionalMillis(b)) => (*a as f64).total_cmp(b),
            (Self::FractionalMillis(a), Self::Millis(b)) => a.total_cmp(&(*b as f64)),
            (Self::FractionalMillis(a), Self::FractionalMillis(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Blob(a), Self::Blob(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

fn real_to_millis(f: f64) -> f64 {
    if JULIAN_DAY_RANGE.contains(&f) {
        (f - UNIX_EPOCH_JULIAN_DAY) * MILLIS_PER_DAY
    } else if f.abs() < SECONDS_LIMIT {
        f * 1000.0
    } else {
        f
    }
}

fn parse_datetime(s: &str) -> Option<i64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Interpret a stored value as whole Unix milliseconds.
///
/// See [`Timestamp`] for the accepted encodings. NULL, BLOB and
/// unparseable text yield `None`.
#[must_use]
pub fn timestamp_millis(value: &Value) -> Option<i64> {
    if matches!(value, Value::Null) {
        return None;
    }
    Timestamp::from_value(value).as_millis()
}

/// Render a SQLite value as a short string (for logs and messages).
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Real(f) => serde_json::Value::from(*f),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Blob(b) => serde_json::Value::String(b.iter().map(|byte| format!("{byte:02x}")).collect()),
    }
}
