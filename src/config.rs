//! # Configuration
//!
//! Externally supplied knobs: the set of connections that must never be
//! truncated, and overrides for the driver-to-sniffer mapping.
//!
//! Loading order mirrors the usual layering: package defaults, then an
//! optional YAML file, then environment variables. Later layers win. A
//! missing config file is not an error; the defaults are enough for the
//! common case.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{FixtureError, Result};

/// Environment variable naming an alternate config file location.
pub const CONFIG_FILE_ENV: &str = "TEST_SUITE_LIGHT_CONFIG";
/// Environment variable holding a comma-separated ignored-connection list.
pub const IGNORED_CONNECTIONS_ENV: &str = "TEST_SUITE_LIGHT_IGNORED_CONNECTIONS";

const DEFAULT_CONFIG_FILE: &str = "test_suite_light.yaml";

/// Read-only configuration for the fixture manager.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FixtureConfig {
    /// Connections `reset_dirty_state` must skip even when their name says
    /// "test". `test_debug_kit` is ignored out of the box: host frameworks
    /// create it incidentally for their debug tooling and it holds no
    /// fixture state worth resetting.
    pub ignored_connections: BTreeSet<String>,

    /// Driver name -> sniffer identifier overrides, merged over the
    /// built-in mapping (mysql/postgres/sqlite each to their own sniffer).
    pub sniffers: HashMap<String, String>,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            ignored_connections: BTreeSet::from(["test_debug_kit".to_string()]),
            sniffers: HashMap::new(),
        }
    }
}

impl FixtureConfig {
    /// Defaults, then the config file (if any), then environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        let path = std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        if Path::new(&path).exists() {
            let from_file = Self::from_yaml_file(&path)?;
            config = config.merge(from_file);
            debug!(path = %path, "loaded fixture configuration file");
        }

        config.apply_env();
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            FixtureError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw)
            .map_err(|e| FixtureError::Configuration(format!("invalid config: {e}")))
    }

    /// Layer `other` over `self`: ignored sets union, sniffer overrides
    /// from `other` win per driver.
    pub fn merge(mut self, other: Self) -> Self {
        self.ignored_connections.extend(other.ignored_connections);
        self.sniffers.extend(other.sniffers);
        self
    }

    fn apply_env(&mut self) {
        if let Ok(raw) = std::env::var(IGNORED_CONNECTIONS_ENV) {
            self.ignored_connections.extend(
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_ignore_the_debug_kit_connection() {
        let config = FixtureConfig::default();
        assert!(config.ignored_connections.contains("test_debug_kit"));
        assert!(config.sniffers.is_empty());
    }

    #[test]
    fn yaml_parses_both_sections() {
        let config = FixtureConfig::from_yaml(
            "ignored_connections: [test_metrics]\nsniffers:\n  mysql: sqlite\n",
        )
        .unwrap();
        assert!(config.ignored_connections.contains("test_metrics"));
        assert_eq!(config.sniffers.get("mysql").map(String::as_str), Some("sqlite"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = FixtureConfig::from_yaml("ignored_tables: [users]\n").unwrap_err();
        assert!(matches!(err, FixtureError::Configuration(_)));
    }

    #[test]
    fn merge_unions_ignores_and_overrides_sniffers() {
        let base = FixtureConfig::default();
        let overlay = FixtureConfig::from_yaml(
            "ignored_connections: [test_metrics]\nsniffers:\n  postgres: mysql\n",
        )
        .unwrap();

        let merged = base.merge(overlay);
        assert!(merged.ignored_connections.contains("test_debug_kit"));
        assert!(merged.ignored_connections.contains("test_metrics"));
        assert_eq!(
            merged.sniffers.get("postgres").map(String::as_str),
            Some("mysql")
        );
    }

    #[test]
    fn config_file_is_optional() {
        // No file on disk and no env override: load() falls back to defaults.
        let loaded = FixtureConfig::load().unwrap();
        assert!(loaded.ignored_connections.contains("test_debug_kit"));
    }
}
