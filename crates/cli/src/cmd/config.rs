//! Configuration management command
//!
//! Provides CLI interface to view and edit the system configuration.

use crate::system_config::{self, SystemConfig};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

/// List all configuration values
pub async fn run_list(explicit: Option<&Path>) -> Result<()> {
    let config_path = system_config::resolve_path(explicit)?;
    let config = system_config::load_from(&config_path)?;

    println!("{}", "System Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), config_path.display().dimmed());

    println!("{}", "[settle]".yellow());
    println!(
        "  {} = {} {}",
        "debounce_secs".cyan(),
        config.settle.debounce_secs,
        format!("({}s)", config.settle.debounce_secs).dimmed()
    );
    println!(
        "  {} = {} {}",
        "max_retries".cyan(),
        config.settle.max_retries,
        format!("(up to {} probes)", u64::from(config.settle.max_retries) + 1).dimmed()
    );
    println!("  {} = {}", "identity".cyan(), config.settle.identity);

    println!("\n{}", "[watch]".yellow());
    println!("  {} = {}", "recursive".cyan(), config.watch.recursive);
    println!(
        "  {} = {} {}",
        "heartbeat_secs".cyan(),
        config.watch.heartbeat_secs,
        format!(
            "({}s = {} min)",
            config.watch.heartbeat_secs,
            config.watch.heartbeat_secs / 60
        )
        .dimmed()
    );

    println!("\n{}", "[action]".yellow());
    println!("  {} = {}", "move_to".cyan(), display_opt(&config.action.move_to));
    println!("  {} = {}", "failed_to".cyan(), display_opt(&config.action.failed_to));
    println!("  {} = {}", "emit_json".cyan(), config.action.emit_json);

    println!("\n{}", "[logging]".yellow());
    println!("  {} = {}", "level".cyan(), config.logging.level);
    println!("  {} = {}", "file".cyan(), display_opt(&config.logging.file));

    println!("\n{}", "Valid Ranges:".bold());
    println!("  debounce_secs: 1-3600");
    println!("  max_retries: 0-1000");
    println!("  heartbeat_secs: 1-86400");
    println!("  identity: full-path | file-name");

    Ok(())
}

/// Get a single configuration value
pub async fn run_get(explicit: Option<&Path>, key: &str) -> Result<()> {
    let config = system_config::load(explicit)?;
    println!("{}", get_value(&config, key)?);
    Ok(())
}

/// Set a configuration value
pub async fn run_set(explicit: Option<&Path>, key: &str, value: &str) -> Result<()> {
    let config_path = system_config::resolve_path(explicit)?;
    let mut config = system_config::load_from(&config_path)?;

    set_value(&mut config, key, value)?;
    config.validate().context("Invalid configuration value")?;
    system_config::save(&config, &config_path)?;

    println!("{} {} = {}", "✓".green(), key.cyan(), value);
    println!(
        "{}",
        "Note: Restart running watchers for changes to take effect".yellow()
    );

    Ok(())
}

/// Show the config file path and optionally create it
pub async fn run_path(explicit: Option<&Path>, create: bool) -> Result<()> {
    let config_path = system_config::resolve_path(explicit)?;

    if create && system_config::init_if_missing(&config_path)? {
        println!("{} Created config file at: {}", "✓".green(), config_path.display());
    } else {
        println!("{}", config_path.display());
        if !config_path.exists() {
            println!("{}", "File does not exist. Use --create to create it.".yellow());
        }
    }

    Ok(())
}

/// Show example configuration
pub async fn run_example() -> Result<()> {
    print!("{}", system_config::example_config());
    Ok(())
}

fn display_opt(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => p.display().to_string(),
        None => "(unset)".to_string(),
    }
}

fn get_value(config: &SystemConfig, key: &str) -> Result<String> {
    let value = match key {
        "settle.debounce_secs" => config.settle.debounce_secs.to_string(),
        "settle.max_retries" => config.settle.max_retries.to_string(),
        "settle.identity" => config.settle.identity.to_string(),
        "watch.recursive" => config.watch.recursive.to_string(),
        "watch.heartbeat_secs" => config.watch.heartbeat_secs.to_string(),
        "action.move_to" => display_opt(&config.action.move_to),
        "action.failed_to" => display_opt(&config.action.failed_to),
        "action.emit_json" => config.action.emit_json.to_string(),
        "logging.level" => config.logging.level.clone(),
        "logging.file" => display_opt(&config.logging.file),
        _ => anyhow::bail!(
            "Unknown config key: {}. Use 'settle config list' to see available keys.",
            key
        ),
    };
    Ok(value)
}

fn set_value(config: &mut SystemConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "settle.debounce_secs" => {
            config.settle.debounce_secs = value
                .parse()
                .context("Invalid value: must be a positive integer")?;
        }
        "settle.max_retries" => {
            config.settle.max_retries = value
                .parse()
                .context("Invalid value: must be a non-negative integer")?;
        }
        "settle.identity" => {
            config.settle.identity = value.parse().map_err(anyhow::Error::msg)?;
        }
        "watch.recursive" => {
            config.watch.recursive = value
                .parse()
                .context("Invalid value: must be 'true' or 'false'")?;
        }
        "watch.heartbeat_secs" => {
            config.watch.heartbeat_secs = value
                .parse()
                .context("Invalid value: must be a positive integer")?;
        }
        "action.move_to" => config.action.move_to = parse_opt_path(value),
        "action.failed_to" => config.action.failed_to = parse_opt_path(value),
        "action.emit_json" => {
            config.action.emit_json = value
                .parse()
                .context("Invalid value: must be 'true' or 'false'")?;
        }
        "logging.level" => config.logging.level = value.to_string(),
        "logging.file" => config.logging.file = parse_opt_path(value),
        _ => anyhow::bail!(
            "Unknown config key: {}. Use 'settle config list' to see available keys.",
            key
        ),
    }
    Ok(())
}

/// Empty string clears an optional path
fn parse_opt_path(value: &str) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}
