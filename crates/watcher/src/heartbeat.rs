//! Watch liveness heartbeat
//!
//! Periodically logs that the watcher is alive, with a monotonically
//! increasing tick, the number of files still pending and whether the
//! watched directory still exists.

use settle_core::Scheduler;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

/// Liveness heartbeat
pub struct Heartbeat {
    /// Watched directory
    root: PathBuf,

    /// Tick interval (default: 5 minutes)
    interval: Duration,

    /// Scheduler whose pending count is reported
    scheduler: Scheduler,
}

impl Heartbeat {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

    pub fn new(root: PathBuf, interval: Duration, scheduler: Scheduler) -> Self {
        Self {
            root,
            interval,
            scheduler,
        }
    }

    /// Run until `shutdown` flips to true (or its sender is dropped)
    ///
    /// The first tick fires immediately. Returns the number of ticks.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;

        info!("Starting heartbeat (interval: {:?})", self.interval);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = timer.tick() => {
                    ticks += 1;
                    self.beat(ticks);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Heartbeat stopped after {} ticks", ticks);
        ticks
    }

    fn beat(&self, tick: u64) {
        if !self.root.is_dir() {
            warn!(
                "Watched directory {} is gone (tick {})",
                self.root.display(),
                tick
            );
            return;
        }

        info!(
            "Watcher alive at {} (tick {}, {} pending)",
            chrono::Local::now().to_rfc3339(),
            tick,
            self.scheduler.pending_len()
        );
    }
}
