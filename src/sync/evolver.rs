//! Schema evolution for replicated tables.
//!
//! Every replicated table needs the tracking columns `updated_at`,
//! `updated_by` and `synced_at`. Columns are checked through
//! `PRAGMA table_info` before anything is altered, so already-evolved
//! tables produce no errors. Failures are collected rather than
//! swallowed; the caller decides whether they degrade the run.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::model::{TableDescriptor, TRACKING_COLUMNS};
use crate::storage::tables::{add_column, column_exists, table_exists};
use crate::sync::types::{SyncError, SyncResult};

/// What one evolution pass did to a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvolutionReport {
    /// Tracking columns added across all tables.
    pub columns_added: usize,
    /// Tables absent from the store (nothing to evolve).
    pub tables_missing: Vec<String>,
    /// Human-readable failures, prefixed with the store label.
    pub failures: Vec<String>,
}

impl EvolutionReport {
    /// Whether every present table now has all tracking columns.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Add whichever tracking columns `table` lacks.
///
/// Returns how many columns were added.
///
/// # Errors
///
/// Returns `SyncError::Schema` on the first column that cannot be checked
/// or added.
pub fn add_missing_tracking_columns(conn: &Connection, table: &str) -> SyncResult<usize> {
    let mut added = 0;
    for (column, declaration) in TRACKING_COLUMNS {
        let schema_error = |e: rusqlite::Error| SyncError::Schema {
            table: format!("{table}.{column}"),
            message: e.to_string(),
        };

        if column_exists(conn, table, column).map_err(schema_error)? {
            continue;
        }
        add_column(conn, table, column, declaration).map_err(schema_error)?;
        debug!(table, column, "Added tracking column");
        added += 1;
    }
    Ok(added)
}

/// Ensure every replicated table present in `conn` has the tracking columns.
///
/// `store` labels the store in logs and failure messages (`local`,
/// `master`). Missing tables are skipped, not created.
pub fn ensure_tracking_columns(conn: &Connection, store: &str, tables: &[TableDescriptor]) -> EvolutionReport {
    let mut report = EvolutionReport::default();

    for table in tables {
        match table_exists(conn, &table.name) {
            Ok(true) => {}
            Ok(false) => {
                debug!(store, table = %table.name, "Table absent; skipping evolution");
                report.tables_missing.push(table.name.clone());
                continue;
            }
            Err(e) => {
                warn!(store, table = %table.name, error = %e, "Could not inspect table");
                report.failures.push(format!("{store}: {}: {e}", table.name));
                continue;
            }
        }

        match add_missing_tracking_columns(conn, &table.name) {
            Ok(added) => report.columns_added += added,
            Err(e) => {
                warn!(store, error = %e, "Schema evolution failed");
                report.failures.push(format!("{store}: {e}"));
            }
        }
    }

    if report.columns_added > 0 {
        info!(store, columns = report.columns_added, "Added tracking columns");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tables::column_names;

    fn tables() -> Vec<TableDescriptor> {
        vec![
            TableDescriptor::new("customers", "id"),
            TableDescriptor::new("projects", "id"),
        ]
    }

    #[test]
    fn test_adds_missing_columns_and_skips_missing_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE customers (id TEXT PRIMARY KEY, name TEXT)")
            .unwrap();

        let report = ensure_tracking_columns(&conn, "local", &tables());
        assert!(report.is_clean());
        assert_eq!(report.columns_added, 3);
        assert_eq!(report.tables_missing, vec!["projects".to_string()]);

        let columns = column_names(&conn, "customers").unwrap();
        for (column, _) in TRACKING_COLUMNS {
            assert!(columns.iter().any(|c| c == column), "missing {column}");
        }
    }

    #[test]
    fn test_second_pass_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE customers (id TEXT PRIMARY KEY, updated_at INTEGER)")
            .unwrap();

        let first = ensure_tracking_columns(&conn, "local", &tables());
        assert_eq!(first.columns_added, 2);

        let second = ensure_tracking_columns(&conn, "local", &tables());
        assert!(second.is_clean());
        assert_eq!(second.columns_added, 0);
    }

    #[test]
    fn test_failures_are_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("master.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE customers (id TEXT PRIMARY KEY)")
            .unwrap();
        let conn = Connection::open_with_flags(&path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY).unwrap();

        let report = ensure_tracking_columns(&conn, "master", &tables());
        assert!(!report.is_clean());
        assert!(report.failures[0].starts_with("master: "));
    }
}
