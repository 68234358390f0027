//! Configuration types for PromptKit.
//!
//! Configuration lives in `<root>/.promptkit/config.toml`. Every section is
//! optional and every key inside a section falls back to its default, so a
//! file that sets a single value is valid. Paths are always derived from the
//! root directory and are never read from the file.

use crate::adapter::AdaptationOptions;
use crate::error::{PromptKitError, Result};
use crate::history::MAX_HISTORY_ITEMS;
use crate::variables::DEFAULT_SUGGESTION_LIMIT;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Name of the per-project directory holding config and data.
pub const CONFIG_DIR_NAME: &str = ".promptkit";

/// Main PromptKit configuration.
#[derive(Debug, Clone)]
pub struct PromptKitConfig {
    /// Project root directory.
    pub root: PathBuf,

    /// Directory for persisted favorites, custom templates and history
    /// (`.promptkit/data`).
    pub data_dir: PathBuf,

    /// Path to the configuration file (`.promptkit/config.toml`).
    pub config_file: PathBuf,

    /// Meta-prompt override directories, first match wins.
    pub prompt_dirs: Vec<PathBuf>,

    /// Variable history settings.
    pub history: HistoryConfig,

    /// Adaptation applied by the service when the caller passes none.
    pub adaptation: AdaptationOptions,

    /// Chain execution settings.
    pub chain: ChainConfig,
}

impl PromptKitConfig {
    /// Creates a configuration with defaults and paths derived from `root`.
    pub fn new(root: PathBuf) -> Self {
        let config_dir = root.join(CONFIG_DIR_NAME);
        Self {
            data_dir: config_dir.join("data"),
            config_file: config_dir.join("config.toml"),
            prompt_dirs: Vec::new(),
            root,
            history: HistoryConfig::default(),
            adaptation: AdaptationOptions::default(),
            chain: ChainConfig::default(),
        }
    }

    /// Loads `<root>/.promptkit/config.toml`, falling back to defaults when absent.
    ///
    /// Relative prompt directories are resolved against `root`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigParseError` for malformed TOML or unknown enum values,
    /// `InvalidConfig` for out-of-range values, and `Io` when the file exists
    /// but cannot be read.
    pub fn load(root: PathBuf) -> Result<Self> {
        let mut config = Self::new(root);

        let content = match std::fs::read_to_string(&config.config_file) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %config.config_file.display(), "no config file, using defaults");
                return Ok(config);
            }
            Err(e) => return Err(e.into()),
        };

        let file: ConfigFile = toml::from_str(&content).map_err(|e| {
            PromptKitError::ConfigParseError(format!("{}: {}", config.config_file.display(), e))
        })?;

        config.history = file.history;
        config.adaptation = file.adaptation;
        config.chain = file.chain;
        config.prompt_dirs = file
            .prompts
            .dirs
            .into_iter()
            .map(|dir| {
                if dir.is_absolute() {
                    dir
                } else {
                    config.root.join(dir)
                }
            })
            .collect();

        config.validate()?;
        tracing::debug!(path = %config.config_file.display(), "loaded config");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.history.max_entries == 0 {
            return Err(PromptKitError::InvalidConfig(
                "history.max_entries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Variable history settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Values remembered per variable name.
    pub max_entries: usize,

    /// Suggestions returned when the caller gives no limit.
    pub suggestion_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: MAX_HISTORY_ITEMS,
            suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
        }
    }
}

/// Chain execution settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Refuse to run chains whose dependencies are not satisfied.
    pub enforce_validation: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PromptsSection {
    dirs: Vec<PathBuf>,
}

/// On-disk shape of `config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    history: HistoryConfig,
    adaptation: AdaptationOptions,
    chain: ChainConfig,
    prompts: PromptsSection,
}
