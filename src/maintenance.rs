//! Periodic housekeeping: expired pending events and dialogs, stale local
//! photos and idle locks.

use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::App;

/// Counts from one maintenance pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub pending_removed: usize,
    pub wizards_removed: usize,
    pub photos_removed: usize,
    pub locks_pruned: usize,
}

/// Run every sweep once
pub fn run_once(app: &App) -> SweepReport {
    let now = Utc::now();

    let pending_removed = app
        .events
        .sweep_expired_pending(now, app.config.pending_ttl());

    let expired = app.wizards.sweep_expired(now, app.config.wizard_ttl());
    for state in &expired {
        app.discard_photo(state);
    }
    if !expired.is_empty() {
        info!(removed = expired.len(), "Expired wizard dialogs removed");
    }

    let photos_removed = match app.cleanup_photos() {
        Ok(count) => count,
        Err(e) => {
            warn!(error = %e, "Local photo cleanup failed");
            0
        }
    };

    let report = SweepReport {
        pending_removed,
        wizards_removed: expired.len(),
        photos_removed,
        locks_pruned: app.events.prune_locks(),
    };
    debug!(?report, "Maintenance pass finished");
    report
}

/// Spawn the maintenance loop on the runtime
///
/// The first tick fires after one full interval.
pub fn spawn(app: Arc<App>) -> JoinHandle<()> {
    let period = app.config.cleanup_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            run_once(&app);
        }
    })
}
