use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::offline::DEFAULT_MAX_LOCAL_ITEMS;

pub const ENV_DATABASE_URL: &str = "ETYMOS_DATABASE_URL";
pub const ENV_OFFLINE_PATH: &str = "ETYMOS_OFFLINE_PATH";
pub const ENV_MAX_LOCAL_ITEMS: &str = "ETYMOS_MAX_LOCAL_ITEMS";

/// Source of a configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Connection target: a `sqlite:` URL or a database file path
    pub database_url: ConfigValue<String>,
    /// JSON file backing the offline store
    pub offline_path: ConfigValue<PathBuf>,
    /// Maximum number of offline records
    pub max_local_items: ConfigValue<usize>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// On-disk shape of the config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offline_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_local_items: Option<usize>,
}

/// Values to merge into the config file. Absent fields are left alone; a
/// blank `database_url` removes the stored one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigUpdate {
    #[serde(alias = "database_url", alias = "DATABASE_URL")]
    pub database_url: Option<String>,
    #[serde(alias = "offline_path")]
    pub offline_path: Option<PathBuf>,
    #[serde(alias = "max_local_items", alias = "MAX_LOCAL_ITEMS")]
    pub max_local_items: Option<usize>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    fn load_with(
        config_path: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let data_dir = Self::default_data_dir();

        // Start with defaults
        let mut database_url = ConfigValue::new(
            data_dir.join("etymos.db").display().to_string(),
            ConfigSource::Default,
        );
        let mut offline_path =
            ConfigValue::new(data_dir.join("local_words.json"), ConfigSource::Default);
        let mut max_local_items = ConfigValue::new(DEFAULT_MAX_LOCAL_ITEMS, ConfigSource::Default);
        let mut config_file = None;

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if let Some(file_config) = ConfigFile::read(&path)? {
            config_file = Some(path.clone());

            if let Some(url) = file_config.database_url.filter(|u| !u.trim().is_empty()) {
                database_url = ConfigValue::new(resolve_target_path(&path, url), ConfigSource::File);
            }
            if let Some(offline) = file_config.offline_path {
                offline_path = ConfigValue::new(resolve_path(&path, offline), ConfigSource::File);
            }
            if let Some(limit) = file_config.max_local_items {
                max_local_items = ConfigValue::new(validate_limit(limit)?, ConfigSource::File);
            }
        }

        // Apply environment variable overrides
        if let Some(url) = env(ENV_DATABASE_URL).filter(|u| !u.trim().is_empty()) {
            database_url = ConfigValue::new(url, ConfigSource::Environment);
        }
        if let Some(offline) = env(ENV_OFFLINE_PATH) {
            offline_path = ConfigValue::new(PathBuf::from(offline), ConfigSource::Environment);
        }
        if let Some(raw) = env(ENV_MAX_LOCAL_ITEMS) {
            let limit = raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: ENV_MAX_LOCAL_ITEMS,
                    value: raw.clone(),
                })
                .and_then(validate_limit)?;
            max_local_items = ConfigValue::new(limit, ConfigSource::Environment);
        }

        Ok(Self {
            database_url,
            offline_path,
            max_local_items,
            config_file,
        })
    }

    /// Merges `update` into the config file at `path` (or the default path)
    /// and returns what was written.
    pub fn update(path: Option<PathBuf>, update: ConfigUpdate) -> Result<ConfigFile, ConfigError> {
        let path = path.unwrap_or_else(Self::default_config_path);
        let mut file = ConfigFile::read(&path)?.unwrap_or_default();

        if let Some(url) = update.database_url {
            file.database_url = Some(url).filter(|u| !u.trim().is_empty());
        }
        if let Some(offline) = update.offline_path {
            file.offline_path = Some(offline);
        }
        if let Some(limit) = update.max_local_items {
            file.max_local_items = Some(validate_limit(limit)?);
        }

        file.write(&path)?;
        tracing::info!(path = %path.display(), "Configuration updated");
        Ok(file)
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/etymos/
    /// - macOS: ~/Library/Application Support/etymos/
    /// - Windows: %APPDATA%/etymos/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("etymos")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/etymos/
    /// - macOS: ~/Library/Application Support/etymos/
    /// - Windows: %APPDATA%/etymos/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("etymos")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

impl ConfigFile {
    /// `None` when the file does not exist.
    pub fn read(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e))?;
        if contents.trim().is_empty() {
            return Ok(Some(Self::default()));
        }
        serde_yaml::from_str(&contents)
            .map(Some)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e))
    }

    fn write(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteError(parent.to_path_buf(), e))?;
            }
        }
        let contents = serde_yaml::to_string(self).map_err(ConfigError::EncodeError)?;
        std::fs::write(path, contents).map_err(|e| ConfigError::WriteError(path.to_path_buf(), e))
    }
}

// Resolve relative paths against the config file's directory
fn resolve_path(config_path: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        config_path
            .parent()
            .map(|p| p.join(&path))
            .unwrap_or(path)
    } else {
        path
    }
}

fn resolve_target_path(config_path: &Path, target: String) -> String {
    if target.starts_with("sqlite:") {
        target
    } else {
        resolve_path(config_path, PathBuf::from(target))
            .display()
            .to_string()
    }
}

fn validate_limit(limit: usize) -> Result<usize, ConfigError> {
    if limit == 0 {
        return Err(ConfigError::InvalidValue {
            key: "max_local_items",
            value: limit.to_string(),
        });
    }
    Ok(limit)
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    ReadError(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    ParseError(PathBuf, #[source] serde_yaml::Error),

    #[error("Failed to write config file '{}': {}", .0.display(), .1)]
    WriteError(PathBuf, #[source] std::io::Error),

    #[error("Failed to encode config: {0}")]
    EncodeError(#[source] serde_yaml::Error),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}
