//! Watch a directory in the foreground

use crate::action::Actions;
use crate::system_config::SystemConfig;
use crate::util;
use anyhow::{Context, Result};
use settle_core::{ExclusiveOpenProbe, IdentityMode, Scheduler};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use watcher::{DirWatcher, Heartbeat, WatchOptions};

/// Command-line overrides for `settle watch`
#[derive(Debug, Clone, Default)]
pub struct WatchArgs {
    pub dir: PathBuf,
    pub debounce_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub identity: Option<IdentityMode>,
    pub recursive: bool,
    pub move_to: Option<PathBuf>,
    pub failed_to: Option<PathBuf>,
    pub json: bool,
}

impl WatchArgs {
    /// Layer the flags over the file configuration
    pub fn apply(&self, mut config: SystemConfig) -> Result<SystemConfig> {
        if let Some(secs) = self.debounce_secs {
            config.settle.debounce_secs = secs;
        }
        if let Some(retries) = self.max_retries {
            config.settle.max_retries = retries;
        }
        if let Some(identity) = self.identity {
            config.settle.identity = identity;
        }
        if self.recursive {
            config.watch.recursive = true;
        }
        if self.move_to.is_some() {
            config.action.move_to = self.move_to.clone();
        }
        if self.failed_to.is_some() {
            config.action.failed_to = self.failed_to.clone();
        }
        if self.json {
            config.action.emit_json = true;
        }

        config.validate()?;
        Ok(config)
    }
}

pub async fn run(args: WatchArgs, config: SystemConfig) -> Result<()> {
    let root = util::resolve_dir(&args.dir)?;

    let actions = Actions {
        move_to: config.action.move_to.as_deref().map(util::ensure_dir).transpose()?,
        failed_to: config.action.failed_to.as_deref().map(util::ensure_dir).transpose()?,
        emit_json: config.action.emit_json,
    };
    for target in actions.move_to.iter().chain(actions.failed_to.iter()) {
        if config.watch.recursive && target.starts_with(&root) {
            anyhow::bail!(
                "Target directory {} is inside the recursively watched {}",
                target.display(),
                root.display()
            );
        }
    }

    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    let scheduler = Scheduler::new(&config.settle, ExclusiveOpenProbe, outcome_tx)?;
    let action_task = tokio::spawn(actions.run(outcome_rx));

    let mut dir_watcher = DirWatcher::start(
        WatchOptions {
            root: root.clone(),
            recursive: config.watch.recursive,
            identity: config.settle.identity,
        },
        scheduler.clone(),
    )?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let heartbeat = Heartbeat::new(
        root.clone(),
        Duration::from_secs(config.watch.heartbeat_secs),
        scheduler.clone(),
    );
    let heartbeat_task = tokio::spawn(heartbeat.run(shutdown_rx));

    info!(
        "Settling new files in {} (debounce {:?}, max {} retries)",
        dir_watcher.root().display(),
        scheduler.debounce(),
        scheduler.max_retries()
    );

    shutdown_signal().await?;
    info!("Shutting down");

    // Stop intake first so nothing is scheduled after the scheduler closes
    dir_watcher.stop()?;
    scheduler.shutdown();
    let _ = shutdown_tx.send(true);

    let ticks = heartbeat_task.await.context("Heartbeat task failed")?;
    drop(scheduler);

    // The outcome channel closes once the last scheduler handle is gone
    match tokio::time::timeout(Duration::from_secs(5), action_task).await {
        Ok(Ok(stats)) => info!(
            "Stopped after {} heartbeats: {} safe, {} failed, {} action errors",
            ticks, stats.safe, stats.failed, stats.errors
        ),
        Ok(Err(e)) => warn!("Action task failed: {}", e),
        Err(_) => warn!("Timed out waiting for pending actions"),
    }

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("Failed to listen for Ctrl-C")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")
}
