//! Sync orchestrator.
//!
//! [`SyncEngine`] owns the local store for its whole lifetime and drives
//! runs through an explicit state machine:
//!
//! ```text
//! Idle → Connecting → Pulling → Pushing → Idle
//!            │            └─────────┴──→ Failed
//!            └──→ Idle (master unreachable)
//! ```
//!
//! Runs are single-flight: a call made while another run is active is
//! rejected at once with `already_syncing`, nothing is queued. Database
//! work runs on the blocking pool; the master handle is scoped to that
//! worker and released on every exit path. A run holds the local writer
//! throughout, so history and conflict queries go through a separate
//! read-only connection.

use std::fs;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::error::Result;
use crate::model::{RunStatus, SyncDirection, SyncRun};
use crate::storage::{SchemaRegistry, SqliteStorage};
use crate::sync::conflict::ConflictRecord;
use crate::sync::evolver::ensure_tracking_columns;
use crate::sync::journal;
use crate::sync::probe::{check_remote_access, containing_dir};
use crate::sync::remote::RemoteHandle;
use crate::sync::replicator::{pull_table, push_table};
use crate::sync::scheduler::ScheduledSync;
use crate::sync::types::{SyncError, SyncOutcome, SyncResult, SyncStats};

/// Where the engine is in the run lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    /// No run active.
    #[default]
    Idle,
    /// Probing the master.
    Connecting,
    /// Pulling tables from the master.
    Pulling,
    /// Pushing tables to the master.
    Pushing,
    /// The last run aborted. A new run may start.
    Failed,
}

impl SyncPhase {
    /// Get the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Pulling => "pulling",
            Self::Pushing => "pushing",
            Self::Failed => "failed",
        }
    }

    /// Whether a run is in flight.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Pulling | Self::Pushing)
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable engine state, owned by the engine and published as snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineState {
    pub phase: SyncPhase,
    /// Completion time of the last run that got past connectivity.
    pub last_sync_time: Option<i64>,
    /// Stats of the last run that got past connectivity.
    pub stats: SyncStats,
    /// Error or warnings of the last run, if it was not clean.
    pub last_error: Option<String>,
}

impl EngineState {
    /// Whether a run is in flight.
    #[must_use]
    pub const fn is_syncing(&self) -> bool {
        self.phase.is_active()
    }
}

pub(super) struct EngineInner {
    pub(super) config: SyncConfig,
    registry: SchemaRegistry,
    local: Mutex<Option<SqliteStorage>>,
    reader: Mutex<Option<SqliteStorage>>,
    state: Mutex<EngineState>,
    pub(super) scheduler: Mutex<Option<ScheduledSync>>,
}

impl EngineInner {
    fn set_phase(&self, phase: SyncPhase) {
        lock(&self.state).phase = phase;
        debug!(%phase, "Sync phase");
    }
}

/// Lock a mutex, recovering the data if a worker panicked while holding it.
pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Stats and non-fatal failures collected during one run.
#[derive(Debug, Default)]
struct RunReport {
    stats: SyncStats,
    warnings: Vec<String>,
}

/// Bidirectional sync engine between the local store and the shared master.
///
/// Cheap to clone; clones share the same stores and state.
#[derive(Clone)]
pub struct SyncEngine {
    pub(super) inner: Arc<EngineInner>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("local_db", &self.inner.config.local_db)
            .field("remote_db", &self.inner.config.remote_db)
            .field("phase", &self.state().phase)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Build an engine: validate the configuration and schema registry,
    /// open the local store and add missing tracking columns to it.
    ///
    /// The last sync time is restored from the journal.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the local store
    /// cannot be opened.
    pub fn new(config: SyncConfig) -> Result<Self> {
        config.validate()?;
        let registry = config.registry();

        if let Some(parent) = config.local_db.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let local = SqliteStorage::open_local_with_timeout(&config.local_db, config.busy_timeout_ms)?;
        let reader = SqliteStorage::open_reader(&config.local_db, config.busy_timeout_ms)?;

        let report = ensure_tracking_columns(local.conn(), "local", &config.tables);
        for failure in &report.failures {
            warn!(%failure, "Local schema evolution incomplete");
        }

        let last_sync_time = journal::last_completed_sync(local.conn());
        info!(
            local = %config.local_db.display(),
            remote = %config.remote_db.display(),
            tables = config.tables.len(),
            "Sync engine ready"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                registry,
                local: Mutex::new(Some(local)),
                reader: Mutex::new(Some(reader)),
                state: Mutex::new(EngineState {
                    last_sync_time,
                    ..EngineState::default()
                }),
                scheduler: Mutex::new(None),
            }),
        })
    }

    /// The engine's configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        lock(&self.inner.state).clone()
    }

    /// Whether a run is in flight.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        lock(&self.inner.state).is_syncing()
    }

    /// Run a full pull-then-push sync.
    pub async fn sync(&self) -> SyncOutcome {
        self.sync_direction(SyncDirection::Bidirectional).await
    }

    /// Run a sync in one direction (or both).
    ///
    /// Returns immediately with `already_syncing` if a run is active. The
    /// run itself is detached from the caller: dropping the returned future
    /// does not abandon a run halfway.
    pub async fn sync_direction(&self, direction: SyncDirection) -> SyncOutcome {
        if !self.try_begin() {
            debug!("Sync already in progress; rejecting");
            return SyncOutcome::already_syncing();
        }

        let engine = self.clone();
        let run = tokio::spawn(async move { engine.run(direction).await });
        match run.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Sync task failed");
                let message = SyncError::Worker(e.to_string()).to_string();
                let mut state = lock(&self.inner.state);
                state.phase = SyncPhase::Failed;
                state.last_error = Some(message.clone());
                SyncOutcome::failed(message, 0, now_millis())
            }
        }
    }

    fn try_begin(&self) -> bool {
        let mut state = lock(&self.inner.state);
        if state.phase.is_active() {
            return false;
        }
        state.phase = SyncPhase::Connecting;
        true
    }

    async fn run(&self, direction: SyncDirection) -> SyncOutcome {
        let started = Instant::now();
        let remote_path = self.inner.config.remote_db.clone();

        if !check_remote_access(&remote_path).await {
            self.inner.set_phase(SyncPhase::Idle);
            let message = format!(
                "Master database directory {} is not reachable",
                containing_dir(&remote_path).display()
            );
            warn!(%message, "Skipping sync; working offline");
            return SyncOutcome::nas_unavailable(message);
        }

        let inner = Arc::clone(&self.inner);
        let result = match tokio::task::spawn_blocking(move || replicate(&inner, direction)).await {
            Ok(result) => result,
            Err(e) => Err(SyncError::Worker(e.to_string())),
        };

        let duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.finish(direction, result, duration_ms)
    }

    /// Journal the run and publish its results.
    fn finish(&self, direction: SyncDirection, result: SyncResult<RunReport>, duration_ms: i64) -> SyncOutcome {
        match result {
            Ok(report) => {
                let status = if report.warnings.is_empty() {
                    RunStatus::Success
                } else {
                    RunStatus::Partial
                };
                let summary = (!report.warnings.is_empty()).then(|| report.warnings.join("; "));

                let mut run = SyncRun::new(direction, status);
                run.records_pulled = report.stats.total_pulled();
                run.records_pushed = report.stats.total_pushed();
                run.conflicts = report.stats.conflicts;
                run.error_message.clone_from(&summary);
                run.duration_ms = duration_ms;
                run.username = Some(self.inner.config.username.clone());
                self.journal(&run);

                {
                    let mut state = lock(&self.inner.state);
                    state.phase = SyncPhase::Idle;
                    state.last_sync_time = Some(run.timestamp);
                    state.stats = report.stats.clone();
                    state.last_error = summary;
                }

                info!(
                    direction = %direction,
                    status = %status,
                    pulled = run.records_pulled,
                    pushed = run.records_pushed,
                    conflicts = run.conflicts,
                    duration_ms,
                    "Sync finished"
                );
                SyncOutcome::completed(report.stats, duration_ms, run.timestamp, report.warnings)
            }
            Err(e) => {
                error!(direction = %direction, error = %e, "Sync failed");
                let message = e.to_string();

                let mut run = SyncRun::new(direction, RunStatus::Error);
                run.error_message = Some(message.clone());
                run.duration_ms = duration_ms;
                run.username = Some(self.inner.config.username.clone());
                self.journal(&run);

                {
                    let mut state = lock(&self.inner.state);
                    state.phase = SyncPhase::Failed;
                    state.stats = SyncStats::default();
                    state.last_error = Some(message.clone());
                }
                SyncOutcome::failed(message, duration_ms, run.timestamp)
            }
        }
    }

    fn journal(&self, run: &SyncRun) {
        match lock(&self.inner.local).as_ref() {
            Some(local) => journal::log_sync(local.conn(), run),
            None => debug!(run = %run.id, "Engine shut down; run not journaled"),
        }
    }

    /// The newest journaled runs, most recent first.
    ///
    /// Does not wait for an in-flight run.
    #[must_use]
    pub fn get_sync_history(&self, limit: usize) -> Vec<SyncRun> {
        lock(&self.inner.reader)
            .as_ref()
            .map(|local| journal::get_sync_history(local.conn(), limit))
            .unwrap_or_default()
    }

    /// The newest recorded conflicts, most recent first.
    #[must_use]
    pub fn get_conflicts(&self, limit: usize) -> Vec<ConflictRecord> {
        lock(&self.inner.reader)
            .as_ref()
            .map(|local| journal::get_conflicts(local.conn(), limit))
            .unwrap_or_default()
    }

    /// Stop the scheduler and close the local store.
    ///
    /// Waits for an in-flight run to release the local store. Later sync
    /// calls fail with [`SyncError::ShutDown`]. Calling twice is harmless.
    pub fn cleanup(&self) {
        self.stop_scheduled_sync();

        if let Some(reader) = lock(&self.inner.reader).take() {
            if let Err(e) = reader.close() {
                warn!(error = %e, "Failed to close local reader");
            }
        }

        let local = lock(&self.inner.local).take();
        if let Some(local) = local {
            match local.close() {
                Ok(()) => info!("Closed local store"),
                Err(e) => warn!(error = %e, "Failed to close local store"),
            }
        }
    }
}

/// One run's database work, executed on the blocking pool.
fn replicate(inner: &EngineInner, direction: SyncDirection) -> SyncResult<RunReport> {
    let mut local_guard = lock(&inner.local);
    let Some(local) = local_guard.as_mut() else {
        return Err(SyncError::ShutDown);
    };
    let mut remote = RemoteHandle::open(&inner.config.remote_db, inner.config.busy_timeout_ms)?;

    let tables = &inner.config.tables;
    let mut report = RunReport::default();

    for (store, conn) in [("local", local.conn()), ("master", remote.conn())] {
        report
            .warnings
            .extend(ensure_tracking_columns(conn, store, tables).failures);
    }

    if direction.pulls() {
        inner.set_phase(SyncPhase::Pulling);
        for table in tables {
            match pull_table(local.conn_mut(), remote.conn(), table, &inner.registry, now_millis()) {
                Ok(outcome) => {
                    journal::record_conflicts(local.conn(), &outcome.conflicts);
                    report.stats.conflicts += outcome.conflicts.len() as u64;
                    report.stats.pulled.insert(table.name.clone(), outcome.pulled);
                }
                Err(e) => {
                    warn!(table = %table.name, error = %e, "Pull failed; continuing with remaining tables");
                    report.warnings.push(format!("pull {}: {e}", table.name));
                }
            }
        }
    }

    if direction.pushes() {
        inner.set_phase(SyncPhase::Pushing);
        for table in tables {
            match push_table(local.conn_mut(), remote.conn_mut(), table, &inner.registry, now_millis()) {
                Ok(outcome) => {
                    report.stats.pushed.insert(table.name.clone(), outcome.pushed);
                }
                Err(e) => {
                    warn!(table = %table.name, error = %e, "Push failed; continuing with remaining tables");
                    report.warnings.push(format!("push {}: {e}", table.name));
                }
            }
        }
    }

    remote.close();
    Ok(report)
}
