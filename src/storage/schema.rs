//! Store setup and the replicated-table schema registry.
//!
//! The local store is the application's own database: it gets WAL mode and
//! the engine migrations. The master lives on a network share where WAL's
//! shared-memory index is unavailable, so it stays in rollback-journal mode
//! and never receives `sync_log` or `sync_conflicts`.

use std::collections::BTreeMap;

use rusqlite::{Connection, Result};
use tracing::{info, warn};

use crate::error::Error;
use crate::model::{TableDescriptor, TableSchema};
use crate::storage::migrations::{record_version, run_migrations};
use crate::storage::tables::{column_names, table_exists};

/// Prepare the local store: pragmas, then engine migrations.
///
/// # Errors
///
/// Returns an error if a pragma or migration fails.
pub fn apply_local_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    run_migrations(conn)
}

/// Prepare a master-store connection.
///
/// # Errors
///
/// Returns an error if a pragma fails.
pub fn apply_remote_pragmas(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "DELETE")?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    Ok(())
}

/// Versioned, explicit DDL for replicated tables.
///
/// Validated once at engine startup. When a store lacks a replicated table
/// the registry's DDL is the primary way to create it; inferring columns
/// from a sample row is only the fallback for unregistered tables.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, TableSchema>,
}

impl SchemaRegistry {
    /// Build a registry from table name → schema entries.
    #[must_use]
    pub fn new(schemas: BTreeMap<String, TableSchema>) -> Self {
        Self { schemas }
    }

    /// Schema registered for a table.
    #[must_use]
    pub fn get(&self, table: &str) -> Option<&TableSchema> {
        self.schemas.get(table)
    }

    /// Number of registered tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether no table is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Check every entry against a scratch in-memory database.
    ///
    /// Each DDL must create exactly the named table, and that table must
    /// contain the descriptor's primary-key column.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first invalid entry.
    pub fn validate(&self, tables: &[TableDescriptor]) -> crate::error::Result<()> {
        for (name, schema) in &self.schemas {
            if schema.version == 0 {
                return Err(Error::Config(format!(
                    "schema for table '{name}' must have version >= 1"
                )));
            }

            let scratch = Connection::open_in_memory()?;
            scratch.execute_batch(&schema.ddl).map_err(|e| {
                Error::Config(format!("schema for table '{name}' does not apply: {e}"))
            })?;

            let created: Vec<String> = scratch
                .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'")?
                .query_map([], |row| row.get(0))?
                .collect::<Result<_>>()?;
            if created != [name.as_str()] {
                return Err(Error::Config(format!(
                    "schema for table '{name}' must create exactly that table, created {created:?}"
                )));
            }

            match tables.iter().find(|t| &t.name == name) {
                Some(desc) => {
                    let columns = column_names(&scratch, name)?;
                    if !columns.iter().any(|c| c == &desc.primary_key) {
                        return Err(Error::Config(format!(
                            "schema for table '{name}' lacks primary key column '{}'",
                            desc.primary_key
                        )));
                    }
                }
                None => warn!(table = %name, "Schema registered for a table that is not replicated"),
            }
        }
        Ok(())
    }

    /// Create a missing table from its registry entry.
    ///
    /// Returns `false` (and does nothing) when the table already exists or
    /// has no entry. The applied version is recorded in the store's
    /// `schema_migrations` as `registry:<table>:v<version>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL or the version record fails.
    pub fn create_table(&self, conn: &Connection, table: &TableDescriptor) -> Result<bool> {
        let Some(schema) = self.get(&table.name) else {
            return Ok(false);
        };
        if table_exists(conn, &table.name)? {
            return Ok(false);
        }

        conn.execute_batch(&schema.ddl)?;
        record_version(conn, &format!("registry:{}:v{}", table.name, schema.version))?;
        info!(table = %table.name, version = schema.version, "Created table from schema registry");
        Ok(true)
    }
}
