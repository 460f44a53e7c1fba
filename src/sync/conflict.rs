//! Last-writer-wins conflict resolution.
//!
//! Rows are compared by `updated_at` alone, normalised with
//! [`Timestamp`]. A missing timestamp counts as the epoch, and ties leave
//! both sides untouched.

use std::cmp::Ordering;

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::model::record::display_value;
use crate::model::{Record, Timestamp};

/// Outcome of comparing the local and master copies of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The master copy is strictly newer.
    RemoteWins,
    /// The local copy is strictly newer.
    LocalWins,
    /// Same timestamp: no action.
    Equal,
}

/// Compare the local and master `updated_at` values.
#[must_use]
pub fn resolve(local_updated_at: &Timestamp, remote_updated_at: &Timestamp) -> Resolution {
    match remote_updated_at.cmp(local_updated_at) {
        Ordering::Greater => Resolution::RemoteWins,
        Ordering::Less => Resolution::LocalWins,
        Ordering::Equal => Resolution::Equal,
    }
}

/// A pull-time conflict: the local row was newer than the incoming master
/// row, so the master version was discarded.
///
/// Persisted to the local `sync_conflicts` table so the discarded version
/// stays inspectable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Row ID in `sync_conflicts` (0 until persisted).
    pub id: i64,
    pub table_name: String,
    /// Primary-key value, rendered as text.
    pub record_key: String,
    pub local_updated_at: Option<i64>,
    pub remote_updated_at: Option<i64>,
    /// Snapshot of the discarded master row.
    pub remote_version: serde_json::Value,
    /// Detection time (Unix milliseconds).
    pub detected_at: i64,
}

impl ConflictRecord {
    /// Describe a conflict between `local` and the discarded `remote` row.
    #[must_use]
    pub fn new(table_name: &str, key: &Value, local: &Record, remote: &Record, detected_at: i64) -> Self {
        Self {
            id: 0,
            table_name: table_name.to_string(),
            record_key: display_value(key),
            local_updated_at: local.updated_at(),
            remote_updated_at: remote.updated_at(),
            remote_version: remote.to_json(),
            detected_at,
        }
    }
}
