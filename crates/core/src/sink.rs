//! Terminal outcomes and the host callback seam

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Why a file was given up on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Still locked after every allowed retry
    RetriesExhausted,
    /// The file disappeared before it could be probed
    Vanished,
    /// The probe hit an I/O error unrelated to locking
    Probe { message: String },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::RetriesExhausted => f.write_str("retries exhausted"),
            FailureReason::Vanished => f.write_str("file vanished"),
            FailureReason::Probe { message } => write!(f, "probe error: {}", message),
        }
    }
}

/// A file leaving the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Safe {
        identity: String,
        path: PathBuf,
        retry_count: u32,
    },
    Failed {
        identity: String,
        path: PathBuf,
        retry_count: u32,
        reason: FailureReason,
    },
}

impl Outcome {
    pub fn identity(&self) -> &str {
        match self {
            Outcome::Safe { identity, .. } | Outcome::Failed { identity, .. } => identity,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Outcome::Safe { path, .. } | Outcome::Failed { path, .. } => path,
        }
    }

    pub fn retry_count(&self) -> u32 {
        match self {
            Outcome::Safe { retry_count, .. } | Outcome::Failed { retry_count, .. } => *retry_count,
        }
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, Outcome::Safe { .. })
    }
}

/// Receives scheduler callbacks
///
/// `on_safe` and `on_failed` fire exactly once per identity that reaches
/// the corresponding state. For a single identity every `on_retry` happens
/// before its terminal callback. Callbacks run on Tokio worker threads and
/// must not block for long.
pub trait OutcomeSink: Send + Sync + 'static {
    fn on_safe(&self, identity: &str, path: &Path, retry_count: u32);

    fn on_failed(&self, identity: &str, path: &Path, retry_count: u32, reason: FailureReason);

    /// The file was still locked and has been re-armed
    fn on_retry(&self, _identity: &str, _path: &Path, _retry_count: u32) {}
}

/// Forward terminal outcomes into a channel
///
/// A closed receiver drops outcomes silently; the host is shutting down.
impl OutcomeSink for mpsc::UnboundedSender<Outcome> {
    fn on_safe(&self, identity: &str, path: &Path, retry_count: u32) {
        let _ = self.send(Outcome::Safe {
            identity: identity.to_string(),
            path: path.to_path_buf(),
            retry_count,
        });
    }

    fn on_failed(&self, identity: &str, path: &Path, retry_count: u32, reason: FailureReason) {
        let _ = self.send(Outcome::Failed {
            identity: identity.to_string(),
            path: path.to_path_buf(),
            retry_count,
            reason,
        });
    }
}
