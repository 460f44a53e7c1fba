//! SQLite store handles.
//!
//! The same handle type serves both sides of replication. The local store is
//! opened once and held for the engine's lifetime; a master handle is opened
//! fresh for every run (see [`crate::sync::RemoteHandle`]). A read-only
//! reader on the local file serves journal queries while a run holds the
//! writer.

use crate::error::Result;
use crate::storage::schema::{apply_local_schema, apply_remote_pragmas};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::Duration;

/// Default busy timeout for both stores.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// SQLite-based store handle.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Open the local store at the given path.
    ///
    /// Creates the database if needed, enables WAL and applies the engine
    /// migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_local(path: &Path) -> Result<Self> {
        Self::open_local_with_timeout(path, None)
    }

    /// Open the local store with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_local_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(
            timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
        ))?;

        apply_local_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open a read-only connection to an existing local store.
    ///
    /// The local store runs in WAL mode, so this reader never waits for the
    /// writer held by a sync run.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open_reader(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(Duration::from_millis(
            timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
        ))?;
        Ok(Self { conn })
    }

    /// Open the master store on the share.
    ///
    /// The file is created if the containing directory is reachable but the
    /// database does not exist yet (first installation seeds the master).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_remote(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(
            timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
        ))?;

        apply_remote_pragmas(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection.
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Get a mutable reference to the underlying connection (transactions).
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Close the connection, reporting any error from SQLite.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite refuses to close (e.g. unfinalized statements).
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }
}
