//! Bidirectional sync between the local store and the shared master.
//!
//! Each installation keeps a full local copy of the replicated tables and
//! periodically reconciles it with a master SQLite file on a network share:
//!
//! - **Probe**: check the share is reachable before touching any store
//! - **Evolve**: add the `updated_at` / `updated_by` / `synced_at` tracking columns
//! - **Pull**: master rows changed since the local high-water mark → local
//! - **Push**: local rows changed since their own `synced_at` → master
//! - **Journal**: one `sync_log` row per run, conflicts in `sync_conflicts`
//!
//! Conflicts are resolved per row, last writer wins on `updated_at`.
//!
//! # Example
//!
//! ```ignore
//! use qsync::config::SyncConfig;
//! use qsync::sync::SyncEngine;
//!
//! let engine = SyncEngine::new(SyncConfig::new("local.db", "/mnt/nas/master.db"))?;
//! let outcome = engine.sync().await;
//! engine.start_scheduled_sync(5);
//! // ...
//! engine.cleanup();
//! ```

mod conflict;
mod engine;
mod evolver;
mod journal;
mod probe;
mod remote;
mod replicator;
mod scheduler;
mod status;
mod types;

pub use conflict::{resolve, ConflictRecord, Resolution};
pub use engine::{EngineState, SyncEngine, SyncPhase};
pub use evolver::{add_missing_tracking_columns, ensure_tracking_columns, EvolutionReport};
pub use journal::{get_conflicts, get_sync_history, log_sync, DEFAULT_HISTORY_LIMIT};
pub use probe::check_remote_access;
pub use remote::RemoteHandle;
pub use replicator::{pull_table, push_table, PullOutcome, PushOutcome, TableBootstrap};
pub use status::{print_history, print_status, EngineStatus};
pub use types::{SkipReason, SyncError, SyncOutcome, SyncResult, SyncStats};
