use anyhow::{Context, Result};
use std::fs;
use std::io::{BufRead, BufReader};
use std::sync::mpsc;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_watch_missing_directory_fails() -> Result<()> {
    let temp_dir = TempDir::new()?;

    crate::settle!(temp_dir.path(), "watch", "does-not-exist").assert_failure()?;
    Ok(())
}

#[test]
fn test_watch_reports_and_moves_new_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let inbox = temp_dir.path().join("inbox");
    let ready = temp_dir.path().join("ready");
    fs::create_dir(&inbox)?;

    let mut child = crate::settle!(
        temp_dir.path(),
        "watch",
        "inbox",
        "--debounce-secs",
        "1",
        "--move-to",
        "ready",
        "--json"
    )
    .spawn()?;

    // Forward stdout lines so the test can time out
    let stdout = child.stdout.take().context("stdout not piped")?;
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in BufReader::new(stdout).lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    // Give the watcher time to register
    std::thread::sleep(Duration::from_millis(750));
    fs::write(inbox.join("invoice.pdf"), b"%PDF-1.7")?;

    let line = rx.recv_timeout(Duration::from_secs(15));

    // The move runs after the JSON line is printed; wait for it before
    // stopping the process
    for _ in 0..50 {
        if ready.join("invoice.pdf").exists() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    child.kill()?;
    child.wait()?;

    let outcome: serde_json::Value = serde_json::from_str(&line.context("no outcome reported")?)?;
    assert_eq!(outcome["outcome"], "safe");
    assert_eq!(outcome["retry_count"], 0);
    assert!(outcome["path"].as_str().unwrap_or_default().ends_with("invoice.pdf"));

    assert!(ready.join("invoice.pdf").exists());
    assert!(!inbox.join("invoice.pdf").exists());
    Ok(())
}
