//! End-to-end sync runs between two on-disk stores.

use std::path::{Path, PathBuf};

use qsync::config::SyncConfig;
use qsync::model::{RunStatus, SyncDirection, TableDescriptor};
use qsync::sync::{SkipReason, SyncEngine, SyncPhase};
use rusqlite::types::Value;
use rusqlite::Connection;
use tempfile::TempDir;

const CUSTOMERS: &str = "CREATE TABLE customers (id TEXT PRIMARY KEY, name TEXT NOT NULL, city TEXT)";
const PROJECTS: &str = "CREATE TABLE projects (id TEXT PRIMARY KEY, customer_id TEXT, title TEXT, budget REAL)";

const TRACKED_CUSTOMERS: &str = "CREATE TABLE customers (
    id TEXT PRIMARY KEY, name TEXT NOT NULL, city TEXT,
    updated_at INTEGER, updated_by TEXT, synced_at INTEGER)";
const TRACKED_PROJECTS: &str = "CREATE TABLE projects (
    id TEXT PRIMARY KEY, customer_id TEXT, title TEXT, budget REAL,
    updated_at INTEGER, updated_by TEXT, synced_at INTEGER)";

struct Fixture {
    _dir: TempDir,
    local_path: PathBuf,
    remote_path: PathBuf,
}

impl Fixture {
    /// Local store with the application's tables (no tracking columns yet)
    /// and a master with tracked tables.
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let local_path = dir.path().join("local.db");
        let remote_dir = dir.path().join("nas");
        std::fs::create_dir_all(&remote_dir).unwrap();
        let remote_path = remote_dir.join("master.db");

        Connection::open(&local_path)
            .unwrap()
            .execute_batch(&format!("{CUSTOMERS}; {PROJECTS};"))
            .unwrap();
        Connection::open(&remote_path)
            .unwrap()
            .execute_batch(&format!("{TRACKED_CUSTOMERS}; {TRACKED_PROJECTS};"))
            .unwrap();

        Self {
            _dir: dir,
            local_path,
            remote_path,
        }
    }

    fn config(&self) -> SyncConfig {
        let mut config = SyncConfig::new(&self.local_path, &self.remote_path).with_tables(vec![
            TableDescriptor::new("customers", "id"),
            TableDescriptor::new("projects", "id"),
        ]);
        config.username = "estimator-1".to_string();
        config
    }

    fn engine(&self) -> SyncEngine {
        SyncEngine::new(self.config()).unwrap()
    }

    fn local(&self) -> Connection {
        Connection::open(&self.local_path).unwrap()
    }

    fn remote(&self) -> Connection {
        Connection::open(&self.remote_path).unwrap()
    }
}

fn upsert_customer(conn: &Connection, id: &str, name: &str, updated_at: impl rusqlite::ToSql) {
    conn.execute(
        "INSERT INTO customers (id, name, city, updated_at, updated_by) VALUES (?1, ?2, 'Leeds', ?3, 'test')
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, updated_at = excluded.updated_at",
        rusqlite::params![id, name, updated_at],
    )
    .unwrap();
}

fn customer_name(conn: &Connection, id: &str) -> Option<String> {
    conn.query_row("SELECT name FROM customers WHERE id = ?1", [id], |r| r.get(0))
        .ok()
}

/// Every column except `synced_at`, which each store stamps for itself.
fn row_without_sync_stamp(conn: &Connection, table: &str, id: &str) -> Vec<(String, Value)> {
    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {table} WHERE id = ?1"))
        .unwrap();
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    stmt.query_row([id], |row| {
        let mut values = Vec::new();
        for (i, name) in names.iter().enumerate() {
            if name != "synced_at" {
                values.push((name.clone(), row.get::<_, Value>(i)?));
            }
        }
        values.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(values)
    })
    .unwrap()
}

fn rename_share(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap();
    let moved = parent.with_file_name("nas-offline");
    std::fs::rename(parent, &moved).unwrap();
    moved
}

#[tokio::test]
async fn newer_local_edit_survives_pull_and_wins_on_push() {
    let fx = Fixture::new();
    let engine = fx.engine();
    upsert_customer(&fx.local(), "C1", "Local Ltd", 10);
    upsert_customer(&fx.remote(), "C1", "Remote Ltd", 5);

    let outcome = engine.sync().await;
    assert!(outcome.success, "{outcome:?}");
    let stats = outcome.stats.unwrap();
    assert_eq!(stats.conflicts, 1);
    assert_eq!(stats.pulled_for("customers"), 0);
    assert_eq!(stats.pushed_for("customers"), 1);

    assert_eq!(customer_name(&fx.local(), "C1").as_deref(), Some("Local Ltd"));
    assert_eq!(customer_name(&fx.remote(), "C1").as_deref(), Some("Local Ltd"));

    let conflicts = engine.get_conflicts(10);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].record_key, "C1");
    assert_eq!(conflicts[0].remote_version["name"], "Remote Ltd");
}

#[tokio::test]
async fn remote_only_rows_are_pulled_verbatim() {
    let fx = Fixture::new();
    let engine = fx.engine();
    {
        let remote = fx.remote();
        for (i, budget) in [(1, 1200.5), (2, 80.0), (3, 15_000.25)] {
            remote
                .execute(
                    "INSERT INTO projects (id, customer_id, title, budget, updated_at, updated_by, synced_at)
                     VALUES (?1, 'C1', ?2, ?3, ?4, 'estimator-2', ?4)",
                    rusqlite::params![format!("P{i}"), format!("Kitchen {i}"), budget, 1_000 + i],
                )
                .unwrap();
        }
    }

    let outcome = engine.sync_direction(SyncDirection::Pull).await;
    assert!(outcome.success, "{outcome:?}");
    let stats = outcome.stats.unwrap();
    assert_eq!(stats.pulled_for("projects"), 3);
    assert_eq!(stats.total_pushed(), 0);

    let (local, remote) = (fx.local(), fx.remote());
    for id in ["P1", "P2", "P3"] {
        assert_eq!(
            row_without_sync_stamp(&local, "projects", id),
            row_without_sync_stamp(&remote, "projects", id)
        );
    }
}

#[tokio::test]
async fn unreachable_share_leaves_state_untouched() {
    let fx = Fixture::new();
    let engine = fx.engine();
    upsert_customer(&fx.remote(), "C1", "Acme", 100);

    let first = engine.sync().await;
    assert!(first.success);
    let before = engine.state();
    assert!(before.last_sync_time.is_some());

    rename_share(&fx.remote_path);
    let outcome = engine.sync().await;
    assert!(!outcome.success);
    assert_eq!(outcome.reason, Some(SkipReason::NasUnavailable));
    assert!(outcome.message.is_some());

    let after = engine.state();
    assert_eq!(after.last_sync_time, before.last_sync_time);
    assert_eq!(after.stats, before.stats);
    assert_eq!(after.phase, SyncPhase::Idle);
    assert_eq!(engine.get_sync_history(10).len(), 1);
}

#[tokio::test]
async fn newer_master_copy_replaces_local_row() {
    let fx = Fixture::new();
    let engine = fx.engine();
    upsert_customer(&fx.local(), "C1", "Old Name", 100);
    upsert_customer(&fx.remote(), "C1", "New Name", 200);

    let outcome = engine.sync().await;
    assert!(outcome.success);
    assert_eq!(outcome.stats.unwrap().pulled_for("customers"), 1);
    assert_eq!(
        row_without_sync_stamp(&fx.local(), "customers", "C1"),
        row_without_sync_stamp(&fx.remote(), "customers", "C1")
    );
}

#[tokio::test]
async fn second_run_without_writes_moves_nothing() {
    let fx = Fixture::new();
    let engine = fx.engine();
    upsert_customer(&fx.local(), "C1", "Local", 100);
    upsert_customer(&fx.remote(), "C2", "Remote", 200);

    let first = engine.sync().await.stats.unwrap();
    assert_eq!(first.total_pulled(), 1);
    assert_eq!(first.total_pushed(), 1);

    let second = engine.sync().await;
    assert!(second.success);
    let stats = second.stats.unwrap();
    assert_eq!(stats.total_pulled(), 0);
    assert_eq!(stats.total_pushed(), 0);
    assert_eq!(stats.conflicts, 0);
}

#[tokio::test]
async fn overlapping_call_is_rejected_without_touching_stats() {
    let fx = Fixture::new();
    let engine = fx.engine();
    upsert_customer(&fx.remote(), "C1", "Acme", 100);

    let (a, b) = tokio::join!(engine.sync(), engine.sync());
    let (done, rejected) = if a.success { (a, b) } else { (b, a) };

    assert!(done.success, "{done:?}");
    assert!(!rejected.success);
    assert_eq!(rejected.reason, Some(SkipReason::AlreadySyncing));
    assert_eq!(engine.state().stats, done.stats.unwrap());
    assert_eq!(engine.get_sync_history(10).len(), 1);
}

#[tokio::test]
async fn each_newer_local_row_counts_one_conflict() {
    let fx = Fixture::new();
    let engine = fx.engine();
    for (id, local_ts, remote_ts) in [("C1", 50, 40), ("C2", 70, 60), ("C3", 10, 90)] {
        upsert_customer(&fx.local(), id, "local", local_ts);
        upsert_customer(&fx.remote(), id, "remote", remote_ts);
    }

    let outcome = engine.sync_direction(SyncDirection::Pull).await;
    let stats = outcome.stats.unwrap();
    assert_eq!(stats.conflicts, 2);
    assert_eq!(stats.pulled_for("customers"), 1);
    assert_eq!(customer_name(&fx.local(), "C1").as_deref(), Some("local"));
    assert_eq!(customer_name(&fx.local(), "C3").as_deref(), Some("remote"));
}

#[tokio::test]
async fn remote_rows_older_than_local_high_water_mark_are_not_pulled() {
    let fx = Fixture::new();
    let engine = fx.engine();
    upsert_customer(&fx.remote(), "C1", "First", 100);
    assert!(engine.sync().await.success);

    // Written by another installation with a timestamp below this store's
    // MAX(synced_at): the table-wide high-water mark skips it.
    upsert_customer(&fx.remote(), "C2", "Late", 200);
    let outcome = engine.sync().await;
    assert!(outcome.success);
    assert_eq!(outcome.stats.unwrap().pulled_for("customers"), 0);
    assert!(customer_name(&fx.local(), "C2").is_none());
}

#[tokio::test]
async fn failing_table_makes_run_partial() {
    let fx = Fixture::new();
    fx.local()
        .execute_batch("CREATE TABLE quotes (id TEXT PRIMARY KEY, total REAL NOT NULL)")
        .unwrap();
    fx.remote()
        .execute_batch(
            "CREATE TABLE quotes (id TEXT PRIMARY KEY, updated_at INTEGER, updated_by TEXT, synced_at INTEGER);
             INSERT INTO quotes (id, updated_at) VALUES ('Q1', 100);",
        )
        .unwrap();
    upsert_customer(&fx.remote(), "C1", "Acme", 100);

    let config = fx.config().with_tables(vec![
        TableDescriptor::new("quotes", "id"),
        TableDescriptor::new("customers", "id"),
    ]);
    let engine = SyncEngine::new(config).unwrap();

    let outcome = engine.sync().await;
    assert!(outcome.success);
    assert_eq!(outcome.status, Some(RunStatus::Partial));
    assert!(outcome.warnings.iter().any(|w| w.starts_with("pull quotes")));
    assert_eq!(outcome.stats.unwrap().pulled_for("customers"), 1);

    let history = engine.get_sync_history(1);
    assert_eq!(history[0].status, RunStatus::Partial);
    assert!(history[0].error_message.as_deref().unwrap().contains("quotes"));
}

#[tokio::test]
async fn missing_master_table_is_created_from_registry() {
    let fx = Fixture::new();
    fx.local()
        .execute_batch(
            "CREATE TABLE components (id TEXT PRIMARY KEY, sku TEXT, unit_cost REAL);
             INSERT INTO components (id, sku, unit_cost) VALUES ('K1', 'HINGE-35', 2.75);",
        )
        .unwrap();

    let config = fx
        .config()
        .with_tables(vec![TableDescriptor::new("components", "id")])
        .with_schema(
            "components",
            3,
            "CREATE TABLE components (id TEXT PRIMARY KEY, sku TEXT, unit_cost REAL)",
        );
    let engine = SyncEngine::new(config).unwrap();
    fx.local()
        .execute("UPDATE components SET updated_at = 500 WHERE id = 'K1'", [])
        .unwrap();

    let outcome = engine.sync_direction(SyncDirection::Push).await;
    assert!(outcome.success, "{outcome:?}");
    assert_eq!(outcome.stats.unwrap().pushed_for("components"), 1);

    let remote = fx.remote();
    let cost_type: String = remote
        .query_row(
            "SELECT type FROM pragma_table_info('components') WHERE name = 'unit_cost'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(cost_type, "REAL");
    let recorded: bool = remote
        .prepare("SELECT 1 FROM schema_migrations WHERE version = 'registry:components:v3'")
        .unwrap()
        .exists([])
        .unwrap();
    assert!(recorded);
}

#[tokio::test]
async fn journal_survives_restart() {
    let fx = Fixture::new();
    {
        let engine = fx.engine();
        upsert_customer(&fx.remote(), "C1", "Acme", 100);
        assert!(engine.sync().await.success);
        engine.cleanup();
    }

    let engine = fx.engine();
    let history = engine.get_sync_history(10);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].records_pulled, 1);
    assert_eq!(history[0].username.as_deref(), Some("estimator-1"));
    assert_eq!(engine.state().last_sync_time, Some(history[0].timestamp));
}

/// Runs a full sync and checks that an immediate second run is a no-op.
async fn sync_twice(engine: &SyncEngine) -> qsync::sync::SyncStats {
    let first = engine.sync().await;
    assert!(first.success, "{first:?}");
    let second = engine.sync().await;
    let again = second.stats.unwrap();
    assert_eq!((again.total_pulled(), again.total_pushed(), again.conflicts), (0, 0, 0));
    first.stats.unwrap()
}

#[tokio::test]
async fn sqlite_datetime_text_converges_both_ways() {
    let fx = Fixture::new();
    let engine = fx.engine();
    let (local, remote) = (fx.local(), fx.remote());
    upsert_customer(&local, "C1", "old", "2024-01-01 10:00:00");
    upsert_customer(&remote, "C1", "new", "2024-06-01 10:00:00");
    upsert_customer(&local, "C2", "local edit", "2024-06-01 12:00:00");
    upsert_customer(&remote, "C2", "stale", "2024-06-01 11:00:00");

    let stats = sync_twice(&engine).await;
    assert_eq!(stats.pulled_for("customers"), 1);
    assert_eq!(stats.pushed_for("customers"), 1);
    assert_eq!(stats.conflicts, 1);

    assert_eq!(customer_name(&local, "C1").as_deref(), Some("new"));
    assert_eq!(customer_name(&remote, "C2").as_deref(), Some("local edit"));
}

#[tokio::test]
async fn fractional_second_timestamps_converge() {
    let fx = Fixture::new();
    let engine = fx.engine();
    let (local, remote) = (fx.local(), fx.remote());
    upsert_customer(&local, "C1", "local newer", 1_700_000_000.9);
    upsert_customer(&remote, "C1", "remote older", 1_700_000_000.1);
    upsert_customer(&local, "C2", "local older", 1_700_000_000.2);
    upsert_customer(&remote, "C2", "remote newer", 1_700_000_000.7);

    let stats = sync_twice(&engine).await;
    assert_eq!(stats.pulled_for("customers"), 1);
    assert_eq!(stats.pushed_for("customers"), 1);
    assert_eq!(stats.conflicts, 1);

    assert_eq!(customer_name(&remote, "C1").as_deref(), Some("local newer"));
    assert_eq!(customer_name(&local, "C2").as_deref(), Some("remote newer"));
}

#[tokio::test]
async fn rfc3339_and_integer_text_timestamps_converge() {
    const QUOTES: &str = "CREATE TABLE quotes (
        id TEXT PRIMARY KEY, total REAL, updated_at TEXT, updated_by TEXT, synced_at INTEGER)";
    let fx = Fixture::new();
    fx.local().execute_batch(QUOTES).unwrap();
    fx.remote().execute_batch(QUOTES).unwrap();
    let engine = SyncEngine::new(
        fx.config()
            .with_tables(vec![TableDescriptor::new("quotes", "id")]),
    )
    .unwrap();

    let (local, remote) = (fx.local(), fx.remote());
    let put = |conn: &Connection, id: &str, total: f64, updated_at: &str| {
        conn.execute(
            "INSERT INTO quotes (id, total, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![id, total, updated_at],
        )
        .unwrap();
    };
    // 1717236000000 is 2024-06-01T10:00:00Z.
    put(&local, "Q1", 10.0, "2024-06-01T12:00:00Z");
    put(&remote, "Q1", 5.0, "1717236000000");
    put(&local, "Q2", 3.0, "1717236000000");
    put(&remote, "Q2", 7.0, "2024-06-02T00:00:00+02:00");
    put(&remote, "Q3", 1.0, "1717236000000");

    let stats = sync_twice(&engine).await;
    assert_eq!(stats.pulled_for("quotes"), 2);
    assert_eq!(stats.pushed_for("quotes"), 1);
    assert_eq!(stats.conflicts, 1);

    let total = |conn: &Connection, id: &str| -> f64 {
        conn.query_row("SELECT total FROM quotes WHERE id = ?1", [id], |r| r.get(0))
            .unwrap()
    };
    assert!((total(&remote, "Q1") - 10.0).abs() < f64::EPSILON);
    assert!((total(&local, "Q2") - 7.0).abs() < f64::EPSILON);
    assert!((total(&local, "Q3") - 1.0).abs() < f64::EPSILON);
    let stored: String = remote
        .query_row("SELECT updated_at FROM quotes WHERE id = 'Q1'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(stored, "2024-06-01T12:00:00Z");
}
