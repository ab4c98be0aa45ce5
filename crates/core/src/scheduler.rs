//! Debounce/retry scheduler
//!
//! Each pending file owns one timer task. When the timer fires the file is
//! probed; an unlocked file is reported safe, a locked one is re-armed with
//! an incremented retry count until the retry budget runs out.
//!
//! Every arm gets a fresh generation number from a scheduler-wide counter.
//! A timer only acts if the entry still carries the generation it was armed
//! with, so a timer superseded by a later `notify` (or a probe that finished
//! after the entry was refreshed) does nothing.

use crate::config::SettleConfig;
use crate::error::SchedulerError;
use crate::probe::{LockProbe, ProbeStatus};
use crate::sink::{FailureReason, OutcomeSink};
use ahash::AHashMap;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace, warn};

/// Read-only view of a pending entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSnapshot {
    pub path: PathBuf,
    pub retry_count: u32,
    pub deadline: Instant,
}

/// Per-file debounce/retry scheduler
///
/// Cheap to clone; clones share the same pending set. Must be created
/// inside a Tokio runtime, after which `notify` may be called from any
/// thread. Dropping the last clone aborts every pending timer.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    debounce: Duration,
    max_retries: u32,
    probe: Arc<dyn LockProbe>,
    sink: Arc<dyn OutcomeSink>,
    runtime: Handle,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    pending: AHashMap<String, PendingEntry>,
    next_generation: u64,
    closed: bool,
}

struct PendingEntry {
    path: PathBuf,
    retry_count: u32,
    deadline: Instant,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

/// What the expiry handler decided under the lock
enum Transition {
    Safe(PathBuf, u32),
    Retry(PathBuf, u32),
    Failed(PathBuf, u32, FailureReason),
}

impl Scheduler {
    /// Create a scheduler on the current Tokio runtime
    pub fn new<P, S>(config: &SettleConfig, probe: P, sink: S) -> Result<Self, SchedulerError>
    where
        P: LockProbe,
        S: OutcomeSink,
    {
        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        Ok(Self::with_handle(config, probe, sink, runtime))
    }

    /// Create a scheduler whose timers run on `runtime`
    pub fn with_handle<P, S>(config: &SettleConfig, probe: P, sink: S, runtime: Handle) -> Self
    where
        P: LockProbe,
        S: OutcomeSink,
    {
        Self {
            inner: Arc::new(Inner {
                debounce: config.debounce(),
                max_retries: config.max_retries,
                probe: Arc::new(probe),
                sink: Arc::new(sink),
                runtime,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Record a creation notification
    ///
    /// A new identity becomes pending with a retry count of zero. A pending
    /// identity keeps its entry and retry count; only the deadline moves
    /// to `now + debounce` and the timer is re-armed.
    pub fn notify(
        &self,
        identity: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Result<(), SchedulerError> {
        let identity = identity.into();
        let deadline = Instant::now() + self.inner.debounce;

        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(SchedulerError::Closed);
        }

        let generation = state.bump_generation();
        let timer = Inner::arm(&self.inner, identity.clone(), generation, deadline);

        match state.pending.entry(identity) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if let Some(previous) = entry.timer.replace(timer) {
                    previous.abort();
                }
                entry.deadline = deadline;
                entry.generation = generation;
                let retry_count = entry.retry_count;
                debug!(
                    "Refreshed {} (retry {}), new deadline in {:?}",
                    occupied.key(),
                    retry_count,
                    self.inner.debounce
                );
            }
            Entry::Vacant(vacant) => {
                debug!("Pending {} in {:?}", vacant.key(), self.inner.debounce);
                vacant.insert(PendingEntry {
                    path: path.into(),
                    retry_count: 0,
                    deadline,
                    generation,
                    timer: Some(timer),
                });
            }
        }

        Ok(())
    }

    /// Drop a pending entry without any callback
    ///
    /// Returns false if the identity was not pending.
    pub fn cancel(&self, identity: &str) -> bool {
        let removed = self.inner.state.lock().pending.remove(identity);
        match removed {
            Some(entry) => {
                entry.abort_timer();
                debug!("Cancelled {}", identity);
                true
            }
            None => false,
        }
    }

    /// Drop a pending entry only if it was recorded for `path`
    ///
    /// With name-only identities two directories can share an identity;
    /// removing one of the files must not cancel the other.
    pub fn cancel_path(&self, identity: &str, path: &Path) -> bool {
        let removed = {
            let mut state = self.inner.state.lock();
            match state.pending.get(identity) {
                Some(entry) if entry.path == path => state.pending.remove(identity),
                _ => None,
            }
        };
        match removed {
            Some(entry) => {
                entry.abort_timer();
                debug!("Cancelled {} ({})", identity, path.display());
                true
            }
            None => false,
        }
    }

    /// Stop the scheduler
    ///
    /// Every pending entry is dropped and its timer aborted; no callback
    /// fires afterwards and later `notify` calls fail with
    /// [`SchedulerError::Closed`]. Probes already running finish on the
    /// blocking pool and their results are discarded. Returns the number of
    /// entries that were still pending.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<_> = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            state.pending.drain().collect()
        };

        let count = drained.len();
        for (_, entry) in drained {
            entry.abort_timer();
        }
        if count > 0 {
            info!("Scheduler shut down with {} pending file(s) abandoned", count);
        }
        count
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    pub fn is_pending(&self, identity: &str) -> bool {
        self.inner.state.lock().pending.contains_key(identity)
    }

    pub fn snapshot(&self, identity: &str) -> Option<PendingSnapshot> {
        self.inner
            .state
            .lock()
            .pending
            .get(identity)
            .map(|entry| PendingSnapshot {
                path: entry.path.clone(),
                retry_count: entry.retry_count,
                deadline: entry.deadline,
            })
    }

    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    pub fn max_retries(&self) -> u32 {
        self.inner.max_retries
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("debounce", &self.inner.debounce)
            .field("max_retries", &self.inner.max_retries)
            .field("pending", &self.pending_len())
            .finish()
    }
}

impl Inner {
    /// Spawn the one-shot timer for `identity` at `deadline`
    ///
    /// The task only holds a weak reference so an abandoned scheduler does
    /// not keep itself alive through its own timers.
    fn arm(this: &Arc<Self>, identity: String, generation: u64, deadline: Instant) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(this);
        this.runtime.spawn(async move {
            sleep_until(deadline).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(identity, generation).await;
            }
        })
    }

    async fn expire(self: Arc<Self>, identity: String, generation: u64) {
        let path = {
            let state = self.state.lock();
            let Some(entry) = state.pending.get(&identity) else {
                trace!("Timer for {} fired after removal", identity);
                return;
            };
            if entry.generation != generation {
                trace!("Stale timer for {} ignored", identity);
                return;
            }

            // A locked probe past the budget fails instead of re-arming
            debug_assert!(entry.retry_count <= self.max_retries);

            entry.path.clone()
        };

        // Probe without the lock held; it does blocking I/O
        let probe = Arc::clone(&self.probe);
        let probe_path = path.clone();
        let result = tokio::task::spawn_blocking(move || probe.probe(&probe_path)).await;

        let transition = {
            let mut state = self.state.lock();
            let State {
                pending,
                next_generation,
                ..
            } = &mut *state;

            let Some(entry) = pending.get_mut(&identity) else {
                debug!("Discarding probe result for removed {}", identity);
                return;
            };
            if entry.generation != generation {
                debug!("Discarding probe result for refreshed {}", identity);
                return;
            }

            let transition = match result {
                Ok(Ok(ProbeStatus::Unlocked)) => Transition::Safe(path, entry.retry_count),
                Ok(Ok(ProbeStatus::Locked)) => {
                    entry.retry_count += 1;
                    if entry.retry_count > self.max_retries {
                        Transition::Failed(path, entry.retry_count, FailureReason::RetriesExhausted)
                    } else {
                        *next_generation += 1;
                        let generation = *next_generation;
                        let deadline = Instant::now() + self.debounce;

                        entry.generation = generation;
                        entry.deadline = deadline;
                        // Replacing our own handle just detaches it
                        entry.timer = Some(Self::arm(&self, identity.clone(), generation, deadline));
                        Transition::Retry(path, entry.retry_count)
                    }
                }
                Ok(Ok(ProbeStatus::Vanished)) => {
                    Transition::Failed(path, entry.retry_count, FailureReason::Vanished)
                }
                Ok(Err(e)) => Transition::Failed(
                    path,
                    entry.retry_count,
                    FailureReason::Probe {
                        message: e.to_string(),
                    },
                ),
                Err(join_error) => Transition::Failed(
                    path,
                    entry.retry_count,
                    FailureReason::Probe {
                        message: format!("probe task failed: {}", join_error),
                    },
                ),
            };

            if !matches!(transition, Transition::Retry(..)) {
                pending.remove(&identity);
            }
            debug_assert!(
                pending.get(&identity).map_or(true, |e| e.retry_count <= self.max_retries),
                "re-armed entry exceeds retry budget"
            );
            transition
        };

        self.finish(&identity, transition);
    }

    /// Report a transition to the sink; the lock must not be held
    fn finish(&self, identity: &str, transition: Transition) {
        match transition {
            Transition::Safe(path, retry_count) => {
                info!(
                    "{} is safe to process (after {} retries)",
                    path.display(),
                    retry_count
                );
                self.sink.on_safe(identity, &path, retry_count);
            }
            Transition::Retry(path, retry_count) => {
                debug!(
                    "{} still locked, retry {}/{} in {:?}",
                    path.display(),
                    retry_count,
                    self.max_retries,
                    self.debounce
                );
                self.sink.on_retry(identity, &path, retry_count);
            }
            Transition::Failed(path, retry_count, reason) => {
                warn!(
                    "Giving up on {} after {} retries: {}",
                    path.display(),
                    retry_count,
                    reason
                );
                self.sink.on_failed(identity, &path, retry_count, reason);
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for (_, entry) in self.state.get_mut().pending.drain() {
            entry.abort_timer();
        }
    }
}

impl State {
    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

impl PendingEntry {
    fn abort_timer(self) {
        if let Some(timer) = self.timer {
            timer.abort();
        }
    }
}
