//! Watch command implementation: the long-running host.
//!
//! Starts the scheduler, then waits for Ctrl-C and shuts the engine down.

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::sync::SyncEngine;

/// Execute the watch command.
///
/// # Errors
///
/// Returns an error if sync is disabled in the configuration, the engine
/// cannot start, or the signal handler cannot be installed.
pub fn execute(config: SyncConfig, interval: Option<u64>, json: bool) -> Result<()> {
    if !config.enabled {
        return Err(Error::Config(
            "sync is disabled (set \"enabled\": true in the config file)".into(),
        ));
    }

    let interval = interval.unwrap_or(config.interval_minutes);
    if interval == 0 {
        return Err(Error::InvalidArgument("--interval must be at least 1".into()));
    }

    let rt = super::runtime()?;
    let engine = SyncEngine::new(config)?;

    rt.block_on(async {
        engine.start_scheduled_sync(interval);
        if json {
            println!("{}", serde_json::to_string(&engine.get_status())?);
        } else {
            println!(
                "Syncing with {} every {interval} min. Press Ctrl-C to stop.",
                engine.config().remote_db.display()
            );
        }

        let signal = tokio::signal::ctrl_c().await;
        engine.cleanup();
        signal?;
        Ok::<(), Error>(())
    })?;

    if !json {
        println!("Stopped.");
    }
    Ok(())
}
