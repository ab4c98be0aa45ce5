//! Scheduler configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Debounce and retry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    /// Quiet period before a file is probed, and delay between retries (default: 10)
    pub debounce_secs: u64,

    /// Number of retries allowed after the first locked probe (default: 3)
    pub max_retries: u32,

    /// How pending entries are keyed
    pub identity: IdentityMode,
}

impl SettleConfig {
    pub const DEBOUNCE_RANGE: (u64, u64) = (1, 3600);
    pub const MAX_RETRIES_RANGE: (u64, u64) = (0, 1000);

    /// Debounce window as a `Duration`
    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.debounce_secs)
    }

    /// Check every value against its allowed range
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("debounce_secs", self.debounce_secs, Self::DEBOUNCE_RANGE)?;
        check_range(
            "max_retries",
            u64::from(self.max_retries),
            Self::MAX_RETRIES_RANGE,
        )?;
        Ok(())
    }
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            debounce_secs: 10,
            max_retries: 3,
            identity: IdentityMode::default(),
        }
    }
}

fn check_range(field: &'static str, value: u64, (min, max): (u64, u64)) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Key used to coalesce notifications into one pending entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityMode {
    /// Key by the full path. Files with the same name in different
    /// subdirectories stay distinct.
    #[default]
    FullPath,

    /// Key by file name only. Only safe for flat directories.
    FileName,
}

impl IdentityMode {
    /// Derive the identity for `path`
    ///
    /// Returns `None` when `FileName` is requested and the path has no
    /// final component (e.g. `/` or `..`).
    pub fn identity_for(self, path: &Path) -> Option<String> {
        match self {
            IdentityMode::FullPath => Some(path.to_string_lossy().into_owned()),
            IdentityMode::FileName => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
        }
    }
}

impl std::str::FromStr for IdentityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full-path" => Ok(IdentityMode::FullPath),
            "file-name" => Ok(IdentityMode::FileName),
            other => Err(format!(
                "unknown identity mode '{}' (expected 'full-path' or 'file-name')",
                other
            )),
        }
    }
}

impl std::fmt::Display for IdentityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityMode::FullPath => f.write_str("full-path"),
            IdentityMode::FileName => f.write_str("file-name"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = SettleConfig::default();
        assert_eq!(config.debounce_secs, 10);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.identity, IdentityMode::FullPath);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_debounce() {
        let config = SettleConfig {
            debounce_secs: 0,
            ..SettleConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("debounce_secs"));
    }

    #[test]
    fn test_validate_rejects_excessive_retries() {
        let config = SettleConfig {
            max_retries: 5000,
            ..SettleConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SettleConfig = toml::from_str("max_retries = 7\nidentity = \"file-name\"\n").unwrap();
        assert_eq!(config.debounce_secs, 10);
        assert_eq!(config.max_retries, 7);
        assert_eq!(config.identity, IdentityMode::FileName);
    }

    #[test]
    fn test_identity_for_nested_paths() {
        let a = Path::new("/inbox/2024/report.csv");
        let b = Path::new("/inbox/2025/report.csv");

        assert_ne!(
            IdentityMode::FullPath.identity_for(a),
            IdentityMode::FullPath.identity_for(b)
        );
        assert_eq!(
            IdentityMode::FileName.identity_for(a),
            IdentityMode::FileName.identity_for(b)
        );
        assert_eq!(
            IdentityMode::FileName.identity_for(a).as_deref(),
            Some("report.csv")
        );
        assert_eq!(IdentityMode::FileName.identity_for(Path::new("/")), None);
    }

    #[test]
    fn test_identity_mode_parse_roundtrip() {
        for mode in [IdentityMode::FullPath, IdentityMode::FileName] {
            assert_eq!(mode.to_string().parse::<IdentityMode>().unwrap(), mode);
        }
        assert!("by-inode".parse::<IdentityMode>().is_err());
    }
}
