//! One-shot lock probe

use anyhow::Result;
use owo_colors::OwoColorize;
use serde::Serialize;
use settle_core::{ExclusiveOpenProbe, LockProbe, ProbeStatus};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Serialize)]
struct ProbeReport<'a> {
    path: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<ProbeStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn run(paths: &[PathBuf], json: bool) -> Result<()> {
    let mut errors = 0;

    for path in paths {
        debug!("Probing {}", path.display());
        let probe_path = path.clone();
        let result =
            tokio::task::spawn_blocking(move || ExclusiveOpenProbe.probe(&probe_path)).await?;

        let report = match result {
            Ok(status) => ProbeReport {
                path,
                status: Some(status),
                error: None,
            },
            Err(e) => {
                errors += 1;
                ProbeReport {
                    path,
                    status: None,
                    error: Some(e.to_string()),
                }
            }
        };

        if json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            print_report(&report);
        }
    }

    if errors > 0 {
        anyhow::bail!("{} probe(s) failed", errors);
    }
    Ok(())
}

fn print_report(report: &ProbeReport<'_>) {
    let path = report.path.display();
    match (&report.status, &report.error) {
        (Some(ProbeStatus::Unlocked), _) => println!("{}: {}", path, "unlocked".green()),
        (Some(ProbeStatus::Locked), _) => println!("{}: {}", path, "locked".yellow()),
        (Some(ProbeStatus::Vanished), _) => println!("{}: {}", path, "missing".dimmed()),
        (None, Some(error)) => eprintln!("{}: {} ({})", path, "error".red(), error),
        (None, None) => {}
    }
}
