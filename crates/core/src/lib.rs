//! Debounce/retry engine for newly created files
//!
//! This crate provides:
//! - An exclusive-access lock probe
//! - A per-file scheduler that coalesces creation events, probes on
//!   expiry and re-arms locked files with a bounded retry count
//! - The outcome sink seam through which hosts receive results

pub mod config;
pub mod error;
pub mod probe;
pub mod scheduler;
pub mod sink;

// Re-exports
pub use config::{IdentityMode, SettleConfig};
pub use error::{ConfigError, ProbeError, SchedulerError};
pub use probe::{ExclusiveOpenProbe, LockProbe, ProbeStatus};
pub use scheduler::{PendingSnapshot, Scheduler};
pub use sink::{FailureReason, Outcome, OutcomeSink};
