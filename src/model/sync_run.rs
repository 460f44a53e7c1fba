//! Sync run model.
//!
//! One [`SyncRun`] is created per orchestrated run and appended to the
//! sync journal. Runs are never mutated after creation.

use serde::{Deserialize, Serialize};

/// Which halves of a run were executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Remote → local only.
    Pull,
    /// Local → remote only.
    Push,
    /// Pull every table, then push every table.
    #[default]
    Bidirectional,
}

impl SyncDirection {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Push => "push",
            Self::Bidirectional => "bidirectional",
        }
    }

    /// Whether this direction includes the pull phase.
    #[must_use]
    pub const fn pulls(&self) -> bool {
        matches!(self, Self::Pull | Self::Bidirectional)
    }

    /// Whether this direction includes the push phase.
    #[must_use]
    pub const fn pushes(&self) -> bool {
        matches!(self, Self::Push | Self::Bidirectional)
    }
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pull" => Ok(Self::Pull),
            "push" => Ok(Self::Push),
            "bidirectional" | "both" => Ok(Self::Bidirectional),
            _ => Err(format!("Unknown sync direction: {s}")),
        }
    }
}

/// Outcome of a run as recorded in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every table replicated without error.
    Success,
    /// The run finished but some tables or schema steps failed.
    Partial,
    /// The run aborted.
    Error,
}

impl RunStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "partial" => Ok(Self::Partial),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown run status: {s}")),
        }
    }
}

/// A journaled sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    /// Unique identifier (`run_` + UUID fragment).
    pub id: String,

    /// When the run finished (Unix milliseconds).
    pub timestamp: i64,

    /// Direction actually executed.
    pub direction: SyncDirection,

    /// Overall outcome.
    pub status: RunStatus,

    /// Rows pulled across all tables.
    pub records_pulled: u64,

    /// Rows pushed across all tables.
    pub records_pushed: u64,

    /// Pull-time conflicts detected.
    pub conflicts: u64,

    /// Error (or joined warnings) for non-successful runs.
    pub error_message: Option<String>,

    /// Wall-clock duration of the run.
    pub duration_ms: i64,

    /// Identity of the installation that ran the sync.
    pub username: Option<String>,
}

impl SyncRun {
    /// Create a run record stamped with the current time and a fresh ID.
    #[must_use]
    pub fn new(direction: SyncDirection, status: RunStatus) -> Self {
        Self {
            id: format!("run_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]),
            timestamp: chrono::Utc::now().timestamp_millis(),
            direction,
            status,
            records_pulled: 0,
            records_pushed: 0,
            conflicts: 0,
            error_message: None,
            duration_ms: 0,
            username: None,
        }
    }
}
