//! Conflicts command implementation.

use colored::Colorize;
use serde::Serialize;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::sync::ConflictRecord;

#[derive(Serialize)]
struct ConflictsOutput {
    conflicts: Vec<ConflictRecord>,
    count: usize,
}

/// Execute the conflicts command.
///
/// # Errors
///
/// Returns an error if the local store is missing or cannot be opened.
pub fn execute(config: SyncConfig, limit: usize, json: bool) -> Result<()> {
    let engine = super::open_existing(config)?;
    let conflicts = engine.get_conflicts(limit);
    engine.cleanup();

    if json {
        let output = ConflictsOutput {
            count: conflicts.len(),
            conflicts,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("{}", "No conflicts recorded.".dimmed());
        return Ok(());
    }

    println!("{}", "Conflicts".bold().underline());
    for conflict in &conflicts {
        println!(
            "  {}.{}  local {}  master {}",
            conflict.table_name.blue(),
            conflict.record_key.bold(),
            format_ts(conflict.local_updated_at),
            format_ts(conflict.remote_updated_at)
        );
        println!("      {}", conflict.remote_version.to_string().dimmed());
    }
    Ok(())
}

fn format_ts(millis: Option<i64>) -> String {
    millis
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map_or_else(|| "-".to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}
