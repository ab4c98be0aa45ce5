use anyhow::Result;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_probe_reports_unlocked_and_missing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::write(temp_dir.path().join("done.txt"), b"finished")?;

    let result = crate::settle!(temp_dir.path(), "probe", "done.txt", "absent.txt").assert_success()?;

    assert!(result.contains_stdout("done.txt"));
    assert!(result.contains_stdout("unlocked"));
    assert!(result.contains_stdout("missing"));
    Ok(())
}

#[test]
fn test_probe_json_output() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::write(temp_dir.path().join("a.bin"), b"a")?;

    let result = crate::settle!(temp_dir.path(), "probe", "--json", "a.bin", "b.bin").assert_success()?;
    let lines = result.json_lines()?;

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["status"], "unlocked");
    assert_eq!(lines[1]["status"], "vanished");
    Ok(())
}

#[test]
fn test_piped_logs_have_no_color_codes() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::write(temp_dir.path().join("done.txt"), b"finished")?;

    let result =
        crate::settle!(temp_dir.path(), "--log-level", "debug", "probe", "done.txt").assert_success()?;

    assert!(result.contains_stderr("Probing done.txt"));
    assert!(!result.stderr.contains('\x1b'));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_probe_sees_flock_from_another_process() -> Result<()> {
    use std::process::Command;

    // flock(1) from util-linux; skip where it is unavailable
    if Command::new("flock").arg("--version").output().is_err() {
        return Ok(());
    }

    let temp_dir = TempDir::new()?;
    let file = temp_dir.path().join("busy.dat");
    fs::write(&file, b"writing")?;

    let mut holder = Command::new("flock")
        .arg("-x")
        .arg(&file)
        .arg("sleep")
        .arg("5")
        .spawn()?;
    std::thread::sleep(std::time::Duration::from_millis(300));

    let result = crate::settle!(temp_dir.path(), "probe", "--json", "busy.dat").assert_success()?;
    holder.kill()?;
    holder.wait()?;

    assert_eq!(result.json_lines()?[0]["status"], "locked");
    Ok(())
}

#[test]
fn test_probe_directory_fails() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::create_dir(temp_dir.path().join("folder"))?;

    let result = crate::settle!(temp_dir.path(), "probe", "folder").assert_failure()?;
    assert!(result.contains_stderr("error"));
    Ok(())
}
