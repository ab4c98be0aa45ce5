//! Error types for probing and scheduling

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Probe failure unrelated to locking
///
/// Lock conflicts are never reported through this type; they are the
/// expected case and map to [`crate::ProbeStatus::Locked`].
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Opening the file failed for a reason other than a lock conflict
    #[error("failed to open {path} for probing: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The lock syscall itself failed
    #[error("failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Scheduler errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The scheduler has been shut down and accepts no new entries
    #[error("scheduler is shut down")]
    Closed,

    /// No Tokio runtime was available when the scheduler was built
    #[error("scheduler must be created inside a Tokio runtime")]
    NoRuntime,
}

/// Invalid configuration value
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}
