//! Local sync journal and conflict log.
//!
//! Both tables live in the local store only. Writes are best effort: a
//! failure to journal is logged and never fails the run that produced it.
//! Reads degrade to an empty list when the table is missing or the query
//! fails.

use rusqlite::{Connection, OptionalExtension, Result};
use tracing::warn;

use crate::model::{RunStatus, SyncRun};
use crate::storage::tables::table_exists;
use crate::sync::conflict::ConflictRecord;

/// Default page size for history and conflict listings.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Append a run to `sync_log`.
pub fn log_sync(conn: &Connection, run: &SyncRun) {
    if let Err(e) = insert_run(conn, run) {
        warn!(run = %run.id, error = %e, "Failed to journal sync run");
    }
}

fn insert_run(conn: &Connection, run: &SyncRun) -> Result<()> {
    conn.execute(
        "INSERT INTO sync_log (id, timestamp, direction, status, records_pulled, records_pushed,
                               conflicts, error_message, duration_ms, username)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            run.id,
            run.timestamp,
            run.direction.as_str(),
            run.status.as_str(),
            run.records_pulled,
            run.records_pushed,
            run.conflicts,
            run.error_message,
            run.duration_ms,
            run.username,
        ],
    )?;
    Ok(())
}

/// The newest runs, most recent first.
#[must_use]
pub fn get_sync_history(conn: &Connection, limit: usize) -> Vec<SyncRun> {
    match query_history(conn, limit) {
        Ok(runs) => runs,
        Err(e) => {
            warn!(error = %e, "Failed to read sync history");
            Vec::new()
        }
    }
}

fn query_history(conn: &Connection, limit: usize) -> Result<Vec<SyncRun>> {
    if !table_exists(conn, "sync_log")? {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(
        "SELECT id, timestamp, direction, status, records_pulled, records_pushed,
                conflicts, error_message, duration_ms, username
         FROM sync_log
         ORDER BY timestamp DESC, rowid DESC
         LIMIT ?1",
    )?;
    let runs = stmt
        .query_map([i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
            let direction: String = row.get(2)?;
            let status: String = row.get(3)?;
            Ok(SyncRun {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                direction: direction.parse().unwrap_or_default(),
                status: status.parse().unwrap_or(RunStatus::Error),
                records_pulled: row.get(4)?,
                records_pushed: row.get(5)?,
                conflicts: row.get(6)?,
                error_message: row.get(7)?,
                duration_ms: row.get(8)?,
                username: row.get(9)?,
            })
        })?
        .collect();
    runs
}

/// Timestamp of the newest run that got past connectivity
/// (`success` or `partial`), if any.
#[must_use]
pub fn last_completed_sync(conn: &Connection) -> Option<i64> {
    let result = table_exists(conn, "sync_log").and_then(|exists| {
        if !exists {
            return Ok(None);
        }
        conn.query_row(
            "SELECT MAX(timestamp) FROM sync_log WHERE status IN ('success', 'partial')",
            [],
            |row| row.get::<_, Option<i64>>(0),
        )
        .optional()
        .map(Option::flatten)
    });

    match result {
        Ok(ts) => ts,
        Err(e) => {
            warn!(error = %e, "Failed to read last sync time");
            None
        }
    }
}

/// Persist pull-time conflicts to `sync_conflicts`.
pub fn record_conflicts(conn: &Connection, conflicts: &[ConflictRecord]) {
    for conflict in conflicts {
        if let Err(e) = insert_conflict(conn, conflict) {
            warn!(
                table = %conflict.table_name,
                key = %conflict.record_key,
                error = %e,
                "Failed to record conflict"
            );
        }
    }
}

fn insert_conflict(conn: &Connection, conflict: &ConflictRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO sync_conflicts (table_name, record_key, local_updated_at, remote_updated_at,
                                     remote_version, detected_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            conflict.table_name,
            conflict.record_key,
            conflict.local_updated_at,
            conflict.remote_updated_at,
            conflict.remote_version.to_string(),
            conflict.detected_at,
        ],
    )?;
    Ok(())
}

/// The newest recorded conflicts, most recent first.
#[must_use]
pub fn get_conflicts(conn: &Connection, limit: usize) -> Vec<ConflictRecord> {
    match query_conflicts(conn, limit) {
        Ok(conflicts) => conflicts,
        Err(e) => {
            warn!(error = %e, "Failed to read sync conflicts");
            Vec::new()
        }
    }
}

fn query_conflicts(conn: &Connection, limit: usize) -> Result<Vec<ConflictRecord>> {
    if !table_exists(conn, "sync_conflicts")? {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(
        "SELECT id, table_name, record_key, local_updated_at, remote_updated_at,
                remote_version, detected_at
         FROM sync_conflicts
         ORDER BY detected_at DESC, id DESC
         LIMIT ?1",
    )?;
    let conflicts = stmt
        .query_map([i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
            let snapshot: String = row.get(5)?;
            Ok(ConflictRecord {
                id: row.get(0)?,
                table_name: row.get(1)?,
                record_key: row.get(2)?,
                local_updated_at: row.get(3)?,
                remote_updated_at: row.get(4)?,
                remote_version: serde_json::from_str(&snapshot)
                    .unwrap_or(serde_json::Value::String(snapshot)),
                detected_at: row.get(6)?,
            })
        })?
        .collect();
    conflicts
}
