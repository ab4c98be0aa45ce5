use anyhow::Result;
use tempfile::TempDir;

#[test]
fn test_config_example_is_printed() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let result = crate::settle!(temp_dir.path(), "config", "example").assert_success()?;
    assert!(result.contains_stdout("[settle]"));
    assert!(result.contains_stdout("debounce_secs = 10"));
    Ok(())
}

#[test]
fn test_config_get_defaults_without_file() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let result = crate::settle!(temp_dir.path(), "config", "get", "settle.max_retries").assert_success()?;
    assert_eq!(result.stdout.trim(), "3");

    let result = crate::settle!(temp_dir.path(), "config", "get", "settle.identity").assert_success()?;
    assert_eq!(result.stdout.trim(), "full-path");
    Ok(())
}

#[test]
fn test_config_path_create_then_set() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_file = temp_dir.path().join("settle.toml");

    crate::settle!(temp_dir.path(), "config", "path", "--create").assert_success()?;
    assert!(config_file.exists());

    crate::settle!(temp_dir.path(), "config", "set", "settle.max_retries", "6").assert_success()?;
    let result = crate::settle!(temp_dir.path(), "config", "get", "settle.max_retries").assert_success()?;
    assert_eq!(result.stdout.trim(), "6");

    let listed = crate::settle!(temp_dir.path(), "config", "list").assert_success()?;
    assert!(listed.contains_stdout("max_retries"));
    Ok(())
}

#[test]
fn test_config_rejects_bad_values() -> Result<()> {
    let temp_dir = TempDir::new()?;

    crate::settle!(temp_dir.path(), "config", "set", "settle.debounce_secs", "0").assert_failure()?;
    crate::settle!(temp_dir.path(), "config", "get", "settle.bogus").assert_failure()?;
    assert!(!temp_dir.path().join("settle.toml").exists());
    Ok(())
}
