//! Sync status display.
//!
//! [`SyncEngine::get_status`] is a pure read of engine state and
//! configuration, cheap enough for a UI to poll.

use std::collections::BTreeSet;

use colored::Colorize;
use serde::Serialize;

use crate::model::SyncRun;
use crate::sync::engine::{SyncEngine, SyncPhase};
use crate::sync::types::SyncStats;

/// Engine status as reported to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub enabled: bool,
    pub is_syncing: bool,
    pub phase: SyncPhase,
    /// Unix milliseconds.
    pub last_sync_time: Option<i64>,
    pub stats: SyncStats,
    pub scheduled_sync: bool,
    pub interval_minutes: u64,
    pub username: String,
    pub remote_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl SyncEngine {
    /// Current status.
    #[must_use]
    pub fn get_status(&self) -> EngineStatus {
        let state = self.state();
        let config = self.config();
        let scheduled = self.scheduled_interval();

        EngineStatus {
            enabled: config.enabled,
            is_syncing: state.is_syncing(),
            phase: state.phase,
            last_sync_time: state.last_sync_time,
            stats: state.stats,
            scheduled_sync: scheduled.is_some(),
            interval_minutes: scheduled.unwrap_or(config.interval_minutes),
            username: config.username.clone(),
            remote_path: config.remote_db.display().to_string(),
            last_error: state.last_error,
        }
    }
}

/// Print engine status to stdout in a human-readable format.
pub fn print_status(status: &EngineStatus) {
    println!("{}", "Sync Status".bold().underline());
    println!();

    let phase = if status.is_syncing {
        status.phase.as_str().yellow()
    } else if status.phase == SyncPhase::Failed {
        status.phase.as_str().red()
    } else {
        status.phase.as_str().green()
    };
    println!("  State:     {phase}");
    if !status.enabled {
        println!("  {}", "Scheduled sync is disabled in the configuration.".dimmed());
    }
    println!("  Master:    {}", status.remote_path);
    println!("  User:      {}", status.username);
    let schedule = if status.scheduled_sync { "every" } else { "configured for every" };
    println!("  Interval:  {schedule} {} min", status.interval_minutes);
    println!();

    match status.last_sync_time {
        Some(ts) => println!("{} {}", "Last sync:".blue().bold(), format_timestamp(ts)),
        None => println!("{}", "Never synced.".dimmed()),
    }

    if status.stats != SyncStats::default() {
        print_stats(&status.stats);
    }

    if let Some(error) = &status.last_error {
        println!();
        println!("{} {error}", "Last problem:".red().bold());
    }
}

fn print_stats(stats: &SyncStats) {
    println!(
        "  Pulled {}, pushed {}, conflicts {}",
        stats.total_pulled(),
        stats.total_pushed(),
        stats.conflicts
    );
    let tables: BTreeSet<&String> = stats.pulled.keys().chain(stats.pushed.keys()).collect();
    for table in tables {
        let (pulled, pushed) = (stats.pulled_for(table), stats.pushed_for(table));
        if pulled > 0 || pushed > 0 {
            println!("    {table:<14} ↓{pulled} ↑{pushed}");
        }
    }
}

/// Print journaled runs, newest first.
pub fn print_history(runs: &[SyncRun]) {
    if runs.is_empty() {
        println!("{}", "No sync runs recorded.".dimmed());
        return;
    }

    println!("{}", "Sync History".bold().underline());
    for run in runs {
        let status = match run.status {
            crate::model::RunStatus::Success => run.status.as_str().green(),
            crate::model::RunStatus::Partial => run.status.as_str().yellow(),
            crate::model::RunStatus::Error => run.status.as_str().red(),
        };
        println!(
            "  {} {:<7} {:<13} ↓{} ↑{} conflicts {} ({})",
            format_timestamp(run.timestamp),
            status,
            run.direction.as_str(),
            run.records_pulled,
            run.records_pushed,
            run.conflicts,
            format_duration(run.duration_ms)
        );
        if let Some(message) = &run.error_message {
            println!("      {}", message.dimmed());
        }
    }
}

/// Format Unix milliseconds as local time.
fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis).map_or_else(
        || millis.to_string(),
        |dt| {
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        },
    )
}

/// Format a duration in milliseconds as a human-readable string.
fn format_duration(millis: i64) -> String {
    if millis >= 60_000 {
        format!("{}m {}s", millis / 60_000, (millis % 60_000) / 1000)
    } else if millis >= 1000 {
        #[allow(clippy::cast_precision_loss)]
        let secs = millis as f64 / 1000.0;
        format!("{secs:.1}s")
    } else {
        format!("{millis}ms")
    }
}
