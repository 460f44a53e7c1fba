//! Engine migrations embedded at compile time.
//!
//! Migrations are sourced from `/migrations/` at the repo root and
//! embedded into the binary using `include_str!`. They create the
//! engine-owned bookkeeping tables in the local store only. The shared
//! master gets `schema_migrations` alone, holding the registry versions
//! of tables created there.

use rusqlite::{Connection, Result};
use tracing::{info, warn};

/// A single migration with version identifier and SQL content.
struct Migration {
    version: &'static str,
    sql: &'static str,
}

/// All migrations in order, embedded at compile time.
///
/// Version names match the SQL filenames (without .sql extension).
/// The `schema_migrations` table tracks which have been applied.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "001_sync_log",
        sql: include_str!("../../migrations/001_sync_log.sql"),
    },
    Migration {
        version: "002_sync_conflicts",
        sql: include_str!("../../migrations/002_sync_conflicts.sql"),
    },
];

/// Create the `schema_migrations` tracking table if it is missing.
///
/// # Errors
///
/// Returns an error if the statement fails.
pub fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Record a version in `schema_migrations` (no-op if already present).
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn record_version(conn: &Connection, version: &str) -> Result<()> {
    ensure_migrations_table(conn)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![version, chrono::Utc::now().timestamp_millis()],
    )?;
    Ok(())
}

/// Run all pending migrations on the database.
///
/// Already-applied migrations (tracked in `schema_migrations`) are
/// skipped. Idempotent and safe to call on every open.
///
/// # Errors
///
/// Returns an error if a migration fails to apply. ALTER TABLE errors for
/// duplicate columns are logged and the migration is marked complete.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    ensure_migrations_table(conn)?;

    let applied: std::collections::HashSet<String> = conn
        .prepare("SELECT version FROM schema_migrations")?
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    for migration in MIGRATIONS {
        if applied.contains(migration.version) {
            continue;
        }

        info!(version = migration.version, "Applying migration");

        if let Err(e) = conn.execute_batch(migration.sql) {
            if e.to_string().contains("duplicate column name") {
                warn!(
                    version = migration.version,
                    "Migration partially applied (columns exist), marking complete"
                );
            } else {
                return Err(e);
            }
        }

        record_version(conn, migration.version)?;

        info!(version = migration.version, "Migration complete");
    }

    Ok(())
}
