//! CLI configuration and settings management

use crate::{CliError, Result};
use obs_layers::{DEFAULT_KEY_POOL, DEFAULT_LAYERS};
use obs_pipeline::{FallbackPolicy, PipelineOptions};
use obs_python::RenamePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const LOCAL_CONFIG: &str = "obscura.toml";
const HOME_CONFIG: &str = ".obscura.toml";

/// CLI configuration loaded from config files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Staged transform settings
    pub obfuscation: ObfuscationConfig,

    /// Multi-layer encoder settings
    pub encoding: EncodingConfig,

    /// Input file validation
    pub input: InputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObfuscationConfig {
    /// Level used when `--level` is not given
    pub default_level: u8,

    pub rename_policy: RenamePolicy,

    pub fallback: FallbackPolicy,

    /// Log every stage diagnostic
    pub verbose_diagnostics: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// Rounds used when `--layers` is not given
    pub layers: usize,

    /// Keys drawn from for every round
    pub key_pool: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Largest accepted input, in bytes
    pub max_file_size: u64,

    /// Accepted file extensions, without the dot
    pub extensions: Vec<String>,

    /// Refuse to transform or encode a file that does not compile
    pub require_valid_syntax: bool,
}

impl Default for ObfuscationConfig {
    fn default() -> Self {
        Self {
            default_level: 2,
            rename_policy: RenamePolicy::default(),
            fallback: FallbackPolicy::default(),
            verbose_diagnostics: false,
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            layers: DEFAULT_LAYERS,
            key_pool: DEFAULT_KEY_POOL.iter().map(|key| key.to_string()).collect(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            extensions: vec!["py".to_string()],
            require_valid_syntax: true,
        }
    }
}

impl CliConfig {
    /// Load configuration from file, falling back to defaults
    ///
    /// Without an explicit path the first existing file among
    /// `./obscura.toml`, `~/.obscura.toml` and the user config directory wins.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let mut candidates = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(home_dir) = dirs::home_dir() {
            candidates.push(home_dir.join(HOME_CONFIG));
        }
        if let Some(path) = Self::default_config_path() {
            candidates.push(path);
        }

        for candidate in candidates {
            if candidate.is_file() {
                debug!(path = %candidate.display(), "loading config");
                return Self::load_from_file(&candidate);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            CliError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CliError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, content)
            .map_err(|e| CliError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Library options for the staged transform
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions::default()
            .with_rename_policy(self.obfuscation.rename_policy)
            .with_fallback(self.obfuscation.fallback)
            .with_verbose(self.obfuscation.verbose_diagnostics)
    }

    /// Get the default config file path for the current user
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("obscura").join("config.toml"))
    }
}
