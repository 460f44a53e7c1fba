//! Status command implementation.

use crate::config::SyncConfig;
use crate::error::Result;
use crate::sync::print_status;

/// Execute the status command.
///
/// # Errors
///
/// Returns an error if the local store is missing or cannot be opened.
pub fn execute(config: SyncConfig, json: bool) -> Result<()> {
    let engine = super::open_existing(config)?;
    let status = engine.get_status();
    engine.cleanup();

    if json {
        println!("{}", serde_json::to_string(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}
