//! Engine configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/wavestate/config.toml)
//! 3. Environment variables (WAVESTATE_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix
const ENV_PREFIX: &str = "WAVESTATE";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Create every object of a snapshot before resolving references, so
    /// references to keys added in the same snapshot resolve
    #[serde(default = "default_true")]
    pub resolve_forward_references: bool,

    /// Skip the host call when there is nothing to send
    #[serde(default = "default_true")]
    pub skip_empty_flush: bool,

    /// Log level used by the CLI (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resolve_forward_references: true,
            skip_empty_flush: true,
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (WAVESTATE_RESOLVE_FORWARD_REFERENCES,
    ///    WAVESTATE_SKIP_EMPTY_FLUSH, WAVESTATE_LOG_LEVEL)
    /// 2. Config file (~/.config/wavestate/config.toml or WAVESTATE_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: EngineConfig =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // WAVESTATE_RESOLVE_FORWARD_REFERENCES
        if let Ok(val) = std::env::var(format!("{}_RESOLVE_FORWARD_REFERENCES", ENV_PREFIX)) {
            self.resolve_forward_references = parse_flag(&val);
        }

        // WAVESTATE_SKIP_EMPTY_FLUSH
        if let Ok(val) = std::env::var(format!("{}_SKIP_EMPTY_FLUSH", ENV_PREFIX)) {
            self.skip_empty_flush = parse_flag(&val);
        }

        // WAVESTATE_LOG_LEVEL
        if let Ok(val) = std::env::var(format!("{}_LOG_LEVEL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.log_level = val;
            }
        }
    }

    /// Save configuration to a file
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with WAVESTATE_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wavestate")
            .join("config.toml")
    }
}

fn parse_flag(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}
