//! Engine configuration.
//!
//! Layered resolution, highest first:
//! 1. Values set programmatically by the embedding application
//! 2. TOML config file (`~/.config/pairchat/config.toml`)
//! 3. Compiled defaults
//!
//! A missing default-path config file is not an error (defaults are used);
//! an explicit path that doesn't exist is.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// Could not determine the user's config directory.
    #[error("could not determine config directory (no HOME or XDG_CONFIG_HOME)")]
    NoConfigDir,
}

/// `[engine]` section of the config file (all fields optional for partial
/// overrides).
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct EngineFileConfig {
    search_debounce_ms: Option<u64>,
    search_limit: Option<usize>,
    event_buffer: Option<usize>,
    preview_len: Option<usize>,
}

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    engine: EngineFileConfig,
}

/// Fully resolved engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Debounce window between recipient-search keystrokes and the
    /// directory query.
    pub search_debounce: Duration,
    /// Maximum recipient-search results returned.
    pub search_limit: usize,
    /// Capacity of the session event channel.
    pub event_buffer: usize,
    /// Conversation body-preview length in characters.
    pub preview_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search_debounce: Duration::from_millis(250),
            search_limit: 20,
            event_buffer: 64,
            preview_len: 80,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from the default path, falling back to compiled
    /// defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config directory cannot be resolved
    /// or an existing file cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        let path = dir.join("pairchat").join("config.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Loads configuration from an explicit path. A missing file is an
    /// error here, unlike the default-path lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile = toml::from_str(&text)?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: ConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            search_debounce: file
                .engine
                .search_debounce_ms
                .map_or(defaults.search_debounce, Duration::from_millis),
            search_limit: file.engine.search_limit.unwrap_or(defaults.search_limit),
            event_buffer: file.engine.event_buffer.unwrap_or(defaults.event_buffer),
            preview_len: file.engine.preview_len.unwrap_or(defaults.preview_len),
        }
    }
}
