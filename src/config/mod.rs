//! Configuration management.
//!
//! This module resolves where the stores live, which tables replicate and
//! how often, and who the installation is.
//!
//! # Sources
//!
//! Settings are layered, later sources winning:
//! 1. Built-in defaults (six quoting tables, 5 minute interval)
//! 2. `~/.quotesync/config.json`, or the file given with `--config`
//! 3. `QSYNC_LOCAL_DB`, `QSYNC_REMOTE_DB` and `QSYNC_USER`
//! 4. Command-line flags (applied by the CLI)

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{TableDescriptor, TableSchema};
use crate::storage::SchemaRegistry;

/// Tables replicated when the config names none.
pub const DEFAULT_TABLES: [&str; 6] = [
    "customers",
    "projects",
    "quotes",
    "quote_items",
    "assemblies",
    "components",
];

/// Default scheduler interval.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 5;

/// Engine configuration, fixed for the engine's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Whether the host should schedule syncs at all.
    pub enabled: bool,

    /// The installation's own database.
    pub local_db: PathBuf,

    /// The shared master database on the network share.
    pub remote_db: PathBuf,

    /// Minutes between scheduled runs.
    pub interval_minutes: u64,

    /// Identity recorded in the journal.
    pub username: String,

    /// Replicated tables, processed in this order.
    pub tables: Vec<TableDescriptor>,

    /// Schema registry: authoritative DDL per table.
    pub schemas: BTreeMap<String, TableSchema>,

    /// SQLite busy timeout for both stores.
    pub busy_timeout_ms: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            local_db: default_local_db().unwrap_or_else(|| PathBuf::from("quotesync.db")),
            remote_db: PathBuf::new(),
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            username: default_username(),
            tables: DEFAULT_TABLES
                .iter()
                .map(|name| TableDescriptor::new(*name, "id"))
                .collect(),
            schemas: BTreeMap::new(),
            busy_timeout_ms: None,
        }
    }
}

impl SyncConfig {
    /// Config for a pair of stores with default tables and interval.
    #[must_use]
    pub fn new(local_db: impl Into<PathBuf>, remote_db: impl Into<PathBuf>) -> Self {
        Self {
            local_db: local_db.into(),
            remote_db: remote_db.into(),
            ..Self::default()
        }
    }

    /// Replace the replicated tables.
    #[must_use]
    pub fn with_tables(mut self, tables: Vec<TableDescriptor>) -> Self {
        self.tables = tables;
        self
    }

    /// Register authoritative DDL for a table.
    #[must_use]
    pub fn with_schema(mut self, table: &str, version: u32, ddl: &str) -> Self {
        self.schemas.insert(
            table.to_string(),
            TableSchema {
                version,
                ddl: ddl.to_string(),
            },
        );
        self
    }

    /// Apply environment overrides from `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = non_empty("QSYNC_LOCAL_DB") {
            self.local_db = PathBuf::from(path);
        }
        if let Some(path) = non_empty("QSYNC_REMOTE_DB") {
            self.remote_db = PathBuf::from(path);
        }
        if let Some(user) = non_empty("QSYNC_USER") {
            self.username = user;
        }
    }

    /// The schema registry built from `schemas`.
    #[must_use]
    pub fn registry(&self) -> SchemaRegistry {
        SchemaRegistry::new(self.schemas.clone())
    }

    /// Check the configuration before an engine is built from it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for a missing store path, a zero interval,
    /// empty or duplicate table entries, or an invalid registry entry.
    pub fn validate(&self) -> Result<()> {
        if self.local_db.as_os_str().is_empty() {
            return Err(Error::Config("local_db is not configured".into()));
        }
        if self.remote_db.as_os_str().is_empty() {
            return Err(Error::Config(
                "remote_db is not configured (set it in config.json, QSYNC_REMOTE_DB or --remote-db)".into(),
            ));
        }
        if self.interval_minutes == 0 {
            return Err(Error::Config("interval_minutes must be positive".into()));
        }

        let mut seen = HashSet::new();
        for table in &self.tables {
            if table.name.trim().is_empty() || table.primary_key.trim().is_empty() {
                return Err(Error::Config(
                    "table entries need a name and a primary key".into(),
                ));
            }
            if !seen.insert(table.name.as_str()) {
                return Err(Error::Config(format!("table '{}' is listed twice", table.name)));
            }
        }

        self.registry().validate(&self.tables)
    }
}

/// The global quotesync directory, `~/.quotesync/`.
#[must_use]
pub fn global_quotesync_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".quotesync"))
}

/// Default config file location.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    global_quotesync_dir().map(|dir| dir.join("config.json"))
}

/// Default local store location, `~/.quotesync/data/local.db`.
#[must_use]
pub fn default_local_db() -> Option<PathBuf> {
    global_quotesync_dir().map(|dir| dir.join("data").join("local.db"))
}

/// Get the default username.
///
/// Priority:
/// 1. `QSYNC_USER` environment variable
/// 2. `USER` / `USERNAME`
/// 3. "unknown"
#[must_use]
pub fn default_username() -> String {
    ["QSYNC_USER", "USER", "USERNAME"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Load configuration.
///
/// Reads `explicit_path` if given (it must exist), otherwise the default
/// location (missing file means defaults), then applies environment
/// overrides.
///
/// # Errors
///
/// Returns `Error::Config` if the file cannot be read or parsed.
pub fn load_config(explicit_path: Option<&Path>) -> Result<SyncConfig> {
    let mut config = match explicit_path {
        Some(path) => read_config_file(path)?,
        None => match default_config_path() {
            Some(path) if path.exists() => read_config_file(&path)?,
            _ => SyncConfig::default(),
        },
    };

    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<SyncConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {e}", path.display()))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {e}", path.display()))
    })
}

/// Save configuration as pretty JSON, creating the directory if needed.
///
/// # Errors
///
/// Returns `Error::Config` if the file cannot be written.
pub fn save_config(config: &SyncConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Error::Config(format!("Failed to create config directory: {e}"))
        })?;
    }

    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).map_err(|e| {
        Error::Config(format!("Failed to write config file: {e}"))
    })?;

    Ok(())
}
