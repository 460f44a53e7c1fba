//! Scoped master-store handle.
//!
//! A master connection is opened for exactly one run. The handle closes it
//! on every exit path: explicitly through [`RemoteHandle::close`], or on
//! drop when a run returns early or unwinds.

use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, warn};

use crate::storage::SqliteStorage;
use crate::sync::types::{SyncError, SyncResult};

/// Owns the master connection for the duration of one run.
#[derive(Debug)]
pub struct RemoteHandle {
    storage: Option<SqliteStorage>,
}

impl RemoteHandle {
    /// Open the master store.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::RemoteUnavailable` if the file cannot be opened.
    pub fn open(path: &Path, busy_timeout_ms: Option<u64>) -> SyncResult<Self> {
        let storage = SqliteStorage::open_remote(path, busy_timeout_ms)
            .map_err(|e| SyncError::RemoteUnavailable(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "Opened master store");
        Ok(Self {
            storage: Some(storage),
        })
    }

    fn storage(&self) -> &SqliteStorage {
        match self.storage.as_ref() {
            Some(storage) => storage,
            None => unreachable!("master handle used after close"),
        }
    }

    fn storage_mut(&mut self) -> &mut SqliteStorage {
        match self.storage.as_mut() {
            Some(storage) => storage,
            None => unreachable!("master handle used after close"),
        }
    }

    /// The master connection.
    #[must_use]
    pub fn conn(&self) -> &Connection {
        self.storage().conn()
    }

    /// The master connection, mutably (for transactions).
    pub fn conn_mut(&mut self) -> &mut Connection {
        self.storage_mut().conn_mut()
    }

    /// Close the master connection now, logging any failure.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(storage) = self.storage.take() {
            match storage.close() {
                Ok(()) => debug!("Closed master store"),
                Err(e) => warn!(error = %e, "Failed to close master store"),
            }
        }
    }
}

impl Drop for RemoteHandle {
    fn drop(&mut self) {
        self.release();
    }
}
