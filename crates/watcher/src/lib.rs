//! Directory watching for settle
//!
//! This crate provides:
//! - A notify-backed watcher that feeds file creations into the scheduler
//! - A liveness heartbeat for the watched directory

pub mod heartbeat;

pub use heartbeat::Heartbeat;

use anyhow::{Context, Result};
use crossbeam_channel::{select, Receiver, Sender};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use settle_core::{IdentityMode, Scheduler, SchedulerError};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Watch settings
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Directory to watch
    pub root: PathBuf,
    /// Also watch subdirectories
    pub recursive: bool,
    /// How pending entries are keyed
    pub identity: IdentityMode,
}

/// Directory watcher
///
/// Creations of regular files are forwarded to the scheduler; removals
/// cancel the matching pending entry.
pub struct DirWatcher {
    root: PathBuf,
    watcher: Option<RecommendedWatcher>,
    stop_tx: Option<Sender<()>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl DirWatcher {
    /// Start watching `options.root`
    pub fn start(options: WatchOptions, scheduler: Scheduler) -> Result<Self> {
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);

        let mut watcher = notify::recommended_watcher(event_tx)
            .context("Failed to create file system watcher")?;

        let mode = if options.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(&options.root, mode)
            .with_context(|| format!("Failed to watch {}", options.root.display()))?;

        let identity = options.identity;
        let dispatcher = std::thread::Builder::new()
            .name("settle-dispatch".into())
            .spawn(move || dispatch_loop(event_rx, stop_rx, scheduler, identity))
            .context("Failed to spawn dispatcher thread")?;

        info!(
            "Watching {} ({}, identity: {})",
            options.root.display(),
            if options.recursive { "recursive" } else { "non-recursive" },
            identity
        );

        Ok(Self {
            root: options.root,
            watcher: Some(watcher),
            stop_tx: Some(stop_tx),
            dispatcher: Some(dispatcher),
        })
    }

    /// Stop watching and join the dispatcher
    pub fn stop(&mut self) -> Result<()> {
        // Dropping the notify watcher ends its event thread
        self.watcher.take();

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher
                .join()
                .map_err(|_| anyhow::anyhow!("Dispatcher thread panicked"))?;
            debug!("Stopped watching {}", self.root.display());
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_running(&self) -> bool {
        self.dispatcher.is_some()
    }
}

impl Drop for DirWatcher {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn dispatch_loop(
    events: Receiver<notify::Result<notify::Event>>,
    stop: Receiver<()>,
    scheduler: Scheduler,
    identity: IdentityMode,
) {
    loop {
        select! {
            recv(stop) -> _ => break,
            recv(events) -> msg => match msg {
                Ok(Ok(event)) => {
                    if event.need_rescan() {
                        warn!("Watcher reported dropped events; some creations may be missed");
                    }
                    for watch_event in classify(&event) {
                        if !apply(&scheduler, identity, watch_event) {
                            return;
                        }
                    }
                }
                Ok(Err(e)) => warn!("Watcher error: {}", e),
                Err(_) => break,
            },
        }
    }
}

/// Forward one event; returns false once the scheduler is closed
fn apply(scheduler: &Scheduler, mode: IdentityMode, event: WatchEvent) -> bool {
    let Some(identity) = mode.identity_for(&event.path) else {
        trace!("No identity for {}", event.path.display());
        return true;
    };

    match event.kind {
        EventKind::Create => {
            // Directories show up as `Create(Any)` on some platforms
            if event.path.is_dir() {
                return true;
            }
            debug!("Created: {}", event.path.display());
            match scheduler.notify(identity, event.path) {
                Ok(()) => true,
                Err(SchedulerError::Closed) => {
                    debug!("Scheduler closed, dispatcher exiting");
                    false
                }
                Err(e) => {
                    warn!("Failed to schedule file: {}", e);
                    true
                }
            }
        }
        EventKind::Delete => {
            if scheduler.cancel_path(&identity, &event.path) {
                debug!("Deleted before settling: {}", event.path.display());
            }
            true
        }
    }
}

/// Reduce a raw notify event to the creations and deletions we act on
///
/// A file renamed or moved into place counts as created; the name it left
/// counts as deleted.
pub fn classify(event: &notify::Event) -> Vec<WatchEvent> {
    let kind = match event.kind {
        notify::EventKind::Create(CreateKind::Folder) => return Vec::new(),
        notify::EventKind::Create(_) => EventKind::Create,
        notify::EventKind::Remove(RemoveKind::Folder) => return Vec::new(),
        notify::EventKind::Remove(_) => EventKind::Delete,
        notify::EventKind::Modify(ModifyKind::Name(mode)) => return classify_rename(mode, &event.paths),
        _ => return Vec::new(),
    };

    event
        .paths
        .iter()
        .map(|path| WatchEvent {
            path: path.clone(),
            kind,
        })
        .collect()
}

fn classify_rename(mode: RenameMode, paths: &[PathBuf]) -> Vec<WatchEvent> {
    let event = |path: &PathBuf, kind| WatchEvent {
        path: path.clone(),
        kind,
    };

    match (mode, paths) {
        (RenameMode::To, _) => paths.iter().map(|p| event(p, EventKind::Create)).collect(),
        (RenameMode::From, _) => paths.iter().map(|p| event(p, EventKind::Delete)).collect(),
        (RenameMode::Both, [from, to, ..]) => {
            vec![event(from, EventKind::Delete), event(to, EventKind::Create)]
        }
        // Backends that cannot tell the two sides apart
        _ => paths
            .iter()
            .map(|p| {
                let kind = if p.exists() {
                    EventKind::Create
                } else {
                    EventKind::Delete
                };
                event(p, kind)
            })
            .collect(),
    }
}

/// File system event relevant to settling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Path that changed
    pub path: PathBuf,
    /// Type of change
    pub kind: EventKind,
}

/// Type of file system event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// File created
    Create,
    /// File deleted
    Delete,
}
