//! Command implementations.

pub mod conflicts;
pub mod history;
pub mod init;
pub mod status;
pub mod sync;
pub mod watch;

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::sync::SyncEngine;

/// Open an engine for a read-only command.
///
/// Unlike `sync`, these never create the local store.
fn open_existing(config: SyncConfig) -> Result<SyncEngine> {
    if !config.local_db.exists() {
        return Err(Error::LocalStoreMissing {
            path: config.local_db,
        });
    }
    SyncEngine::new(config)
}

/// Create a Tokio runtime for commands that drive the engine.
fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))
}
