//! Periodic sync scheduling.
//!
//! The first run starts immediately, then one per interval. Ticks missed
//! while a run is in progress are skipped, not caught up, and a manual
//! run that overlaps a tick makes that tick return `already_syncing`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::sync::engine::{lock, SyncEngine};

/// A running scheduler task.
pub(crate) struct ScheduledSync {
    handle: JoinHandle<()>,
    interval_minutes: u64,
}

impl SyncEngine {
    /// Start periodic syncs, replacing any running scheduler.
    ///
    /// Must be called from within a Tokio runtime. An interval of zero is
    /// treated as one minute.
    pub fn start_scheduled_sync(&self, interval_minutes: u64) {
        self.stop_scheduled_sync();

        let interval_minutes = interval_minutes.max(1);
        let period = Duration::from_secs(interval_minutes * 60);
        let engine = self.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let outcome = engine.sync().await;
                debug!(
                    success = outcome.success,
                    reason = ?outcome.reason,
                    "Scheduled sync tick"
                );
            }
        });

        *lock(&self.inner.scheduler) = Some(ScheduledSync {
            handle,
            interval_minutes,
        });
        info!(interval_minutes, "Scheduled sync started");
    }

    /// Stop periodic syncs. A run already in progress completes.
    pub fn stop_scheduled_sync(&self) {
        if let Some(scheduled) = lock(&self.inner.scheduler).take() {
            scheduled.handle.abort();
            info!("Scheduled sync stopped");
        }
    }

    /// Interval of the running scheduler, `None` when not scheduled.
    #[must_use]
    pub fn scheduled_interval(&self) -> Option<u64> {
        lock(&self.inner.scheduler)
            .as_ref()
            .map(|scheduled| scheduled.interval_minutes)
    }

    /// Whether the scheduler is running.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.scheduled_interval().is_some()
    }
}
