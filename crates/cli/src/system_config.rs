//! System configuration file
//!
//! Lives at `<config dir>/settle/config.toml` unless `--config` points
//! elsewhere. A missing file means defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use settle_core::SettleConfig;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub settle: SettleConfig,
    pub watch: WatchConfig,
    pub action: ActionConfig,
    pub logging: LoggingConfig,
}

/// Directory watching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Watch subdirectories too (default: false)
    pub recursive: bool,

    /// Seconds between liveness heartbeats (default: 300)
    pub heartbeat_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            heartbeat_secs: 300,
        }
    }
}

/// What to do with settled files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    /// Move safe files into this directory
    pub move_to: Option<PathBuf>,

    /// Move failed files into this directory
    pub failed_to: Option<PathBuf>,

    /// Print one JSON line per outcome on stdout
    pub emit_json: bool,
}

/// Log output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is unset (default: "info")
    pub level: String,

    /// Also write logs to this file
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl SystemConfig {
    /// Validate all values
    pub fn validate(&self) -> Result<()> {
        self.settle.validate()?;

        if !(1..=86_400).contains(&self.watch.heartbeat_secs) {
            anyhow::bail!(
                "watch.heartbeat_secs must be between 1 and 86400 (got {})",
                self.watch.heartbeat_secs
            );
        }

        if self.logging.level.trim().is_empty() {
            anyhow::bail!("logging.level must not be empty");
        }

        Ok(())
    }
}

/// Default config file location
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("settle").join("config.toml"))
}

/// Resolve the config file to use
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => config_file_path().context("Could not determine config directory"),
    }
}

/// Load configuration, falling back to defaults if the file is missing
pub fn load(explicit: Option<&Path>) -> Result<SystemConfig> {
    let path = resolve_path(explicit)?;
    load_from(&path)
}

pub fn load_from(path: &Path) -> Result<SystemConfig> {
    if !path.exists() {
        return Ok(SystemConfig::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: SystemConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    Ok(config)
}

/// Write configuration to `path`, creating parent directories
pub fn save(config: &SystemConfig, path: &Path) -> Result<()> {
    config.validate().context("Refusing to save invalid configuration")?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let serialized = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, serialized)
        .with_context(|| format!("Failed to write config file {}", path.display()))?;
    Ok(())
}

/// Create the config file with the example contents if it does not exist
pub fn init_if_missing(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    std::fs::write(path, example_config())
        .with_context(|| format!("Failed to write config file {}", path.display()))?;
    Ok(true)
}

/// Annotated example configuration
pub fn example_config() -> &'static str {
    r#"# settle configuration

[settle]
# Quiet period before a new file is probed, and delay between retries
debounce_secs = 10
# Retries allowed after the first locked probe
max_retries = 3
# "full-path" or "file-name" (only for flat directories)
identity = "full-path"

[watch]
recursive = false
heartbeat_secs = 300

[action]
# move_to = "/srv/ready"
# failed_to = "/srv/failed"
emit_json = false

[logging]
level = "info"
# file = "/var/log/settle.log"
"#
}
