//! Downstream actions for settled files
//!
//! Consumes outcomes from the scheduler: logs them, optionally prints them
//! as JSON lines and optionally moves the file somewhere else.

use crate::util;
use anyhow::{Context, Result};
use settle_core::Outcome;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Configured actions
#[derive(Debug, Clone, Default)]
pub struct Actions {
    pub move_to: Option<PathBuf>,
    pub failed_to: Option<PathBuf>,
    pub emit_json: bool,
}

/// Counters reported when the action loop ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionStats {
    pub safe: usize,
    pub failed: usize,
    pub errors: usize,
}

impl Actions {
    /// Handle outcomes until every sender is dropped
    pub async fn run(self, mut outcomes: mpsc::UnboundedReceiver<Outcome>) -> ActionStats {
        let mut stats = ActionStats::default();

        while let Some(outcome) = outcomes.recv().await {
            if outcome.is_safe() {
                stats.safe += 1;
            } else {
                stats.failed += 1;
            }

            if let Err(e) = self.handle(&outcome).await {
                stats.errors += 1;
                warn!("Action for {} failed: {:#}", outcome.path().display(), e);
            }
        }

        stats
    }

    async fn handle(&self, outcome: &Outcome) -> Result<()> {
        if self.emit_json {
            let line = serde_json::to_string(outcome).context("Failed to serialize outcome")?;
            println!("{}", line);
        }

        let target = match outcome {
            Outcome::Safe { .. } => {
                info!("Now safe to process: {}", outcome.path().display());
                self.move_to.as_ref()
            }
            Outcome::Failed { reason, .. } => {
                warn!(
                    "Could not settle {} ({}, {} retries)",
                    outcome.path().display(),
                    reason,
                    outcome.retry_count()
                );
                self.failed_to.as_ref()
            }
        };

        if let Some(dir) = target {
            let dest = util::move_into(outcome.path(), dir).await?;
            info!("Moved {} to {}", outcome.path().display(), dest.display());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settle_core::FailureReason;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_safe_files_are_moved() {
        let temp_dir = TempDir::new().unwrap();
        let inbox = util::ensure_dir(&temp_dir.path().join("inbox")).unwrap();
        let ready = util::ensure_dir(&temp_dir.path().join("ready")).unwrap();
        let failed = util::ensure_dir(&temp_dir.path().join("failed")).unwrap();

        let good = inbox.join("good.csv");
        let bad = inbox.join("bad.csv");
        fs::write(&good, b"ok").unwrap();
        fs::write(&bad, b"partial").unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Outcome::Safe {
            identity: "good.csv".into(),
            path: good.clone(),
            retry_count: 0,
        })
        .unwrap();
        tx.send(Outcome::Failed {
            identity: "bad.csv".into(),
            path: bad.clone(),
            retry_count: 4,
            reason: FailureReason::RetriesExhausted,
        })
        .unwrap();
        drop(tx);

        let actions = Actions {
            move_to: Some(ready.clone()),
            failed_to: Some(failed.clone()),
            emit_json: false,
        };
        let stats = actions.run(rx).await;

        assert_eq!(
            stats,
            ActionStats {
                safe: 1,
                failed: 1,
                errors: 0
            }
        );
        assert!(ready.join("good.csv").exists());
        assert!(failed.join("bad.csv").exists());
        assert!(!good.exists());
        assert!(!bad.exists());
    }

    #[tokio::test]
    async fn test_missing_file_counts_as_error() {
        let temp_dir = TempDir::new().unwrap();
        let ready = util::ensure_dir(&temp_dir.path().join("ready")).unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Outcome::Safe {
            identity: "ghost".into(),
            path: temp_dir.path().join("ghost"),
            retry_count: 0,
        })
        .unwrap();
        drop(tx);

        let actions = Actions {
            move_to: Some(ready),
            ..Actions::default()
        };
        let stats = actions.run(rx).await;
        assert_eq!(stats.safe, 1);
        assert_eq!(stats.errors, 1);
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = Outcome::Failed {
            identity: "a.txt".into(),
            path: PathBuf::from("/in/a.txt"),
            retry_count: 4,
            reason: FailureReason::RetriesExhausted,
        };
        let value: serde_json::Value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(value["outcome"], "failed");
        assert_eq!(value["identity"], "a.txt");
        assert_eq!(value["retry_count"], 4);
        assert_eq!(value["reason"]["kind"], "retries_exhausted");
    }
}
