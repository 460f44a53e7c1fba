//! Set up an installation.
//!
//! Writes the resolved settings to the config file and creates the local
//! store, so later commands need no flags.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::Cli;
use crate::config::{default_config_path, load_config, save_config, SyncConfig};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;

#[derive(Serialize)]
struct InitOutput {
    config_path: PathBuf,
    local_db: PathBuf,
    remote_db: PathBuf,
    username: String,
    tables: usize,
}

/// Execute the init command.
///
/// The config file is `--config` when given, `~/.quotesync/config.json`
/// otherwise. An existing file is kept as the base for the new settings,
/// but only replaced with `--force`.
///
/// # Errors
///
/// Returns an error if the file exists without `--force`, the settings do
/// not validate, or the file or local store cannot be written.
pub fn execute(cli: &Cli, force: bool, json: bool) -> Result<()> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?,
    };

    let exists = config_path.exists();
    if exists && !force {
        return Err(Error::InvalidArgument(format!(
            "Config already exists at {} (use --force to overwrite)",
            config_path.display()
        )));
    }

    let mut config = if exists {
        load_config(Some(&config_path))?
    } else {
        let mut config = SyncConfig::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    };
    cli.apply_overrides(&mut config);
    config.validate()?;

    if let Some(parent) = config.local_db.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    SqliteStorage::open_local_with_timeout(&config.local_db, config.busy_timeout_ms)?.close()?;
    save_config(&config, &config_path)?;

    if json {
        let output = InitOutput {
            config_path,
            local_db: config.local_db,
            remote_db: config.remote_db,
            username: config.username,
            tables: config.tables.len(),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Wrote {}", config_path.display());
        println!("  Local store: {}", config.local_db.display());
        println!("  Master:      {}", config.remote_db.display());
        println!("  User:        {}", config.username);
    }
    Ok(())
}
