//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{load_config, SyncConfig};
use crate::error::Result;
use crate::model::SyncDirection;
use crate::sync::DEFAULT_HISTORY_LIMIT;

pub mod commands;

/// quotesync - keep a local quoting database in step with the shared master
#[derive(Parser, Debug)]
#[command(name = "qsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.quotesync/config.json)
    #[arg(long, global = true, env = "QSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Local database path (overrides config and QSYNC_LOCAL_DB)
    #[arg(long, global = true)]
    pub local_db: Option<PathBuf>,

    /// Master database path on the share (overrides config and QSYNC_REMOTE_DB)
    #[arg(long, global = true)]
    pub remote_db: Option<PathBuf>,

    /// Username recorded in the sync journal
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

impl Cli {
    /// Load the configuration, then apply command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn resolve_config(&self) -> Result<SyncConfig> {
        let mut config = load_config(self.config.as_deref())?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    /// Apply `--local-db`, `--remote-db` and `--user` to `config`.
    pub fn apply_overrides(&self, config: &mut SyncConfig) {
        if let Some(path) = &self.local_db {
            config.local_db.clone_from(path);
        }
        if let Some(path) = &self.remote_db {
            config.remote_db.clone_from(path);
        }
        if let Some(user) = &self.user {
            config.username.clone_from(user);
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the config file and create the local store
    Init {
        /// Overwrite an existing config file
        #[arg(long, short)]
        force: bool,
    },

    /// Run one sync now
    Sync {
        /// Which way to sync: pull, push or both
        #[arg(long, short, default_value = "both")]
        direction: SyncDirection,
    },

    /// Sync on a schedule until interrupted (Ctrl-C)
    Watch {
        /// Minutes between runs (default: from config)
        #[arg(long, short)]
        interval: Option<u64>,
    },

    /// Show engine status
    Status,

    /// Show recent sync runs
    History {
        /// Maximum runs to show
        #[arg(long, short, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },

    /// Show master row versions discarded in favour of newer local edits
    Conflicts {
        /// Maximum conflicts to show
        #[arg(long, short, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },
}
