//! History command implementation.

use serde::Serialize;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::model::SyncRun;
use crate::sync::print_history;

#[derive(Serialize)]
struct HistoryOutput {
    runs: Vec<SyncRun>,
    count: usize,
}

/// Execute the history command.
///
/// # Errors
///
/// Returns an error if the local store is missing or cannot be opened.
pub fn execute(config: SyncConfig, limit: usize, json: bool) -> Result<()> {
    let engine = super::open_existing(config)?;
    let runs = engine.get_sync_history(limit);
    engine.cleanup();

    if json {
        let output = HistoryOutput {
            count: runs.len(),
            runs,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        print_history(&runs);
    }
    Ok(())
}
