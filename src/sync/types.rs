//! Sync types: errors, run statistics and the run result contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::RunStatus;

/// Aggregate counts for one run.
///
/// Lives only for the duration of a run; published to the engine state
/// when the run finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Rows pulled per table.
    pub pulled: BTreeMap<String, u64>,
    /// Rows pushed per table.
    pub pushed: BTreeMap<String, u64>,
    /// Pull-time conflicts across all tables.
    pub conflicts: u64,
}

impl SyncStats {
    /// Rows pulled across all tables.
    #[must_use]
    pub fn total_pulled(&self) -> u64 {
        self.pulled.values().sum()
    }

    /// Rows pushed across all tables.
    #[must_use]
    pub fn total_pushed(&self) -> u64 {
        self.pushed.values().sum()
    }

    /// Pulled count for one table (0 if the table was not pulled).
    #[must_use]
    pub fn pulled_for(&self, table: &str) -> u64 {
        self.pulled.get(table).copied().unwrap_or(0)
    }

    /// Pushed count for one table (0 if the table was not pushed).
    #[must_use]
    pub fn pushed_for(&self, table: &str) -> u64 {
        self.pushed.get(table).copied().unwrap_or(0)
    }
}

/// Why a sync call did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Another run is in flight; nothing is queued.
    AlreadySyncing,
    /// The master's containing directory is unreachable.
    NasUnavailable,
}

/// Result of one `sync()` call.
///
/// Mirrors the contract consumed by the UI collaborator:
/// `{success, stats?, duration?, timestamp?, reason?, message?, error?}`,
/// plus the run status and any non-fatal warnings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<SyncStats>,
    /// Run duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    /// Completion time (Unix milliseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    /// Per-table and schema failures that did not abort the run.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl SyncOutcome {
    fn empty(success: bool) -> Self {
        Self {
            success,
            stats: None,
            duration: None,
            timestamp: None,
            reason: None,
            message: None,
            error: None,
            status: None,
            warnings: Vec::new(),
        }
    }

    /// A run that reached the end (fully or partially successful).
    #[must_use]
    pub fn completed(stats: SyncStats, duration: i64, timestamp: i64, warnings: Vec<String>) -> Self {
        let status = if warnings.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::Partial
        };
        Self {
            stats: Some(stats),
            duration: Some(duration),
            timestamp: Some(timestamp),
            status: Some(status),
            warnings,
            ..Self::empty(true)
        }
    }

    /// Rejected by the single-flight guard.
    #[must_use]
    pub fn already_syncing() -> Self {
        Self {
            reason: Some(SkipReason::AlreadySyncing),
            message: Some("A sync is already in progress".to_string()),
            ..Self::empty(false)
        }
    }

    /// The master could not be reached; nothing was attempted.
    #[must_use]
    pub fn nas_unavailable(message: String) -> Self {
        Self {
            reason: Some(SkipReason::NasUnavailable),
            message: Some(message),
            ..Self::empty(false)
        }
    }

    /// The run aborted.
    #[must_use]
    pub fn failed(error: String, duration: i64, timestamp: i64) -> Self {
        Self {
            duration: Some(duration),
            timestamp: Some(timestamp),
            error: Some(error),
            status: Some(RunStatus::Error),
            ..Self::empty(false)
        }
    }
}

/// Sync-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// The master store could not be opened.
    #[error("Master database unreachable: {0}")]
    RemoteUnavailable(String),

    /// A tracking column could not be added.
    #[error("Schema error on {table}: {message}")]
    Schema {
        /// Table (and column) being evolved.
        table: String,
        /// Underlying failure.
        message: String,
    },

    /// The blocking replication worker panicked or was cancelled.
    #[error("Sync worker failed: {0}")]
    Worker(String),

    /// The engine was cleaned up.
    #[error("Sync engine has been shut down")]
    ShutDown,
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_totals() {
        let mut stats = SyncStats::default();
        stats.pulled.insert("customers".into(), 3);
        stats.pulled.insert("projects".into(), 2);
        stats.pushed.insert("customers".into(), 1);

        assert_eq!(stats.total_pulled(), 5);
        assert_eq!(stats.total_pushed(), 1);
        assert_eq!(stats.pulled_for("projects"), 2);
        assert_eq!(stats.pushed_for("projects"), 0);
    }

    #[test]
    fn test_completed_status_depends_on_warnings() {
        let ok = SyncOutcome::completed(SyncStats::default(), 10, 1, Vec::new());
        assert!(ok.success);
        assert_eq!(ok.status, Some(RunStatus::Success));

        let partial = SyncOutcome::completed(SyncStats::default(), 10, 1, vec!["pull quotes: boom".into()]);
        assert!(partial.success);
        assert_eq!(partial.status, Some(RunStatus::Partial));
    }

    #[test]
    fn test_skip_outcomes_serialize_reason() {
        let json = serde_json::to_value(SyncOutcome::already_syncing()).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["reason"], "already_syncing");
        assert!(json.get("stats").is_none());

        let json = serde_json::to_value(SyncOutcome::nas_unavailable("offline".into())).unwrap();
        assert_eq!(json["reason"], "nas_unavailable");
        assert_eq!(json["message"], "offline");
    }

    #[test]
    fn test_failed_outcome() {
        let outcome = SyncOutcome::failed("disk full".into(), 5, 1);
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("disk full"));
        assert_eq!(outcome.status, Some(RunStatus::Error));
    }
}
