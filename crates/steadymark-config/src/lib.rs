//! Steadymark Config
//!
//! This crate handles configuration loading and management
//! for steadymark, supporting TOML configuration files.
//!
//! # Overview
//!
//! Configuration is loaded from platform-specific locations:
//! - Linux: `~/.config/steadymark/config.toml`
//! - macOS: `~/Library/Application Support/steadymark/config.toml`
//! - Windows: `%APPDATA%\steadymark\config.toml`
//!
//! # Example
//!
//! ```no_run
//! use steadymark_config::Config;
//!
//! // Load config with defaults
//! let config = Config::load().unwrap();
//!
//! // Or load with an override file
//! let config = Config::load_with_override(Some("./custom.toml")).unwrap();
//! ```

mod render;
mod stream;

pub use render::RenderConfig;
pub use stream::StreamConfig;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use steadymark_core::{Result, SteadymarkError};

/// Default TOML configuration string.
const DEFAULT_TOML: &str = r##"[stream]
Strategy             = "standard"
MaxBacktrackDistance = 100
TokenHistorySize     = 20
RingBufferCapacity   = 8192
PendingMarkerCeiling = 32
TokenEvents          = false
IncompleteLinkUrl    = "#"

[render]
Tables           = true
Strikethrough    = true
Tasklists        = true
Footnotes        = false
SmartPunctuation = false
"##;

/// Main configuration structure.
///
/// Contains all configuration sections for steadymark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Streaming and resolution configuration
    #[serde(default)]
    pub stream: StreamConfig,

    /// Batch renderer configuration
    #[serde(default)]
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_TOML).expect("Default TOML should be valid")
    }
}

impl Config {
    /// Returns the default TOML configuration string.
    ///
    /// # Example
    ///
    /// ```
    /// use steadymark_config::Config;
    /// let toml = Config::default_toml();
    /// assert!(toml.contains("[stream]"));
    /// assert!(toml.contains("[render]"));
    /// ```
    pub fn default_toml() -> &'static str {
        DEFAULT_TOML
    }

    /// Returns the platform-specific configuration file path.
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "steadymark")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Returns the platform-specific configuration directory.
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "steadymark")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Ensures the config file exists, creating it with defaults if not.
    ///
    /// # Returns
    ///
    /// The path to the config file.
    pub fn ensure_config_file() -> Result<PathBuf> {
        let config_dir = Self::config_dir()
            .ok_or_else(|| SteadymarkError::Config("Could not determine config directory".into()))?;

        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            std::fs::write(&config_path, DEFAULT_TOML)?;
        }

        Ok(config_path)
    }

    /// Load configuration from the default platform-specific path.
    ///
    /// If no config file exists, returns the default configuration.
    pub fn load() -> Result<Self> {
        if let Some(config_path) = Self::config_path() {
            if config_path.exists() {
                let content = std::fs::read_to_string(&config_path)?;
                return toml::from_str(&content)
                    .map_err(|e| SteadymarkError::Config(format!("Parse error: {}", e)));
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            SteadymarkError::Config(format!("Parse error in {}: {}", path.display(), e))
        })
    }

    /// Load configuration with an optional override file or string.
    ///
    /// 1. Load the base config from the default location
    /// 2. If an override is provided:
    ///    - If it's a path to an existing file, load and merge it
    ///    - Otherwise, treat it as a TOML string and parse it
    ///
    /// # Example
    ///
    /// ```no_run
    /// use steadymark_config::Config;
    ///
    /// let config = Config::load_with_override(Some("[stream]\nTokenEvents = true")).unwrap();
    /// assert!(config.stream.token_events);
    /// ```
    pub fn load_with_override(override_config: Option<&str>) -> Result<Self> {
        let mut config = Self::load()?;

        if let Some(override_str) = override_config {
            let override_config = Self::parse_override(override_str)?;
            config.merge(&override_config);
        }

        Ok(config)
    }

    /// Parse an override given either as a file path or inline TOML.
    pub fn parse_override(override_str: &str) -> Result<Self> {
        let override_path = Path::new(override_str);

        let override_toml = if override_path.is_file() {
            std::fs::read_to_string(override_path)?
        } else {
            override_str.to_string()
        };

        toml::from_str(&override_toml)
            .map_err(|e| SteadymarkError::Config(format!("Override parse error: {}", e)))
    }

    /// Merge another config into this one.
    ///
    /// Values from `other` take precedence over values in `self`.
    ///
    /// # Example
    ///
    /// ```
    /// use steadymark_config::Config;
    /// use steadymark_core::StrategyKind;
    ///
    /// let mut base = Config::default();
    /// let override_config: Config = toml::from_str(r#"
    ///     [stream]
    ///     Strategy = "conservative"
    /// "#).unwrap();
    ///
    /// base.merge(&override_config);
    /// assert_eq!(base.stream.strategy, StrategyKind::Conservative);
    /// ```
    pub fn merge(&mut self, other: &Config) {
        self.stream.merge(&other.stream);
        self.render.merge(&other.render);
    }

    /// Save configuration to a file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| SteadymarkError::Config(format!("Serialization error: {}", e)))?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }
}
