//! Sync command implementation (one run, then exit).

use std::collections::BTreeSet;

use colored::Colorize;

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::model::SyncDirection;
use crate::sync::{SkipReason, SyncEngine, SyncOutcome};

/// Execute the sync command.
///
/// # Errors
///
/// Returns an error if the engine cannot start, the master is unreachable,
/// another run holds the engine, or the run fails.
pub fn execute(config: SyncConfig, direction: SyncDirection, json: bool) -> Result<()> {
    let remote_path = config.remote_db.clone();
    let rt = super::runtime()?;
    let engine = SyncEngine::new(config)?;

    let outcome = rt.block_on(engine.sync_direction(direction));
    engine.cleanup();

    if json {
        println!("{}", serde_json::to_string(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    match (outcome.success, outcome.reason) {
        (true, _) => Ok(()),
        (false, Some(SkipReason::NasUnavailable)) => Err(Error::RemoteUnavailable { path: remote_path }),
        (false, Some(SkipReason::AlreadySyncing)) => Err(Error::RunFailed("a sync is already in progress".into())),
        (false, None) => Err(Error::RunFailed(
            outcome.error.unwrap_or_else(|| "unknown error".to_string()),
        )),
    }
}

fn print_outcome(outcome: &SyncOutcome) {
    if !outcome.success {
        // Failures are reported through the returned error.
        if let Some(message) = &outcome.message {
            println!("{}", message.yellow());
        }
        return;
    }

    let headline = if outcome.warnings.is_empty() {
        "Sync complete".green().bold()
    } else {
        "Sync completed with warnings".yellow().bold()
    };
    println!("{headline} ({} ms)", outcome.duration.unwrap_or(0));

    if let Some(stats) = &outcome.stats {
        println!();
        let tables: BTreeSet<&String> = stats.pulled.keys().chain(stats.pushed.keys()).collect();
        for table in tables {
            let (pulled, pushed) = (stats.pulled_for(table), stats.pushed_for(table));
            if pulled > 0 || pushed > 0 {
                println!("  {table:<14} pulled {pulled:>4}  pushed {pushed:>4}");
            }
        }
        println!(
            "  {}: pulled {}, pushed {}, conflicts {}",
            "Total".bold(),
            stats.total_pulled(),
            stats.total_pushed(),
            stats.conflicts
        );
        if stats.conflicts > 0 {
            println!(
                "{}",
                "Newer local edits were kept; run 'qsync conflicts' to see the master versions they replace."
                    .dimmed()
            );
        }
    }

    for warning in &outcome.warnings {
        println!("  {} {warning}", "warning:".yellow());
    }
}
