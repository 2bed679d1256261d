//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::acquisition::LockTimeout;
use crate::error::Error;

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "RAS_CONFIG_DIR";

/// RAS configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
}

/// Settings the acquisition service is constructed with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Auto-unlock timeout applied to every lock
    #[serde(default)]
    pub unlock_timeout: LockTimeout,
}

impl AcquisitionConfig {
    /// Set the auto-unlock timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.unlock_timeout = LockTimeout::After(timeout);
        self
    }

    /// Disable auto-unlock; locks are only released explicitly
    pub fn never_expire(mut self) -> Self {
        self.unlock_timeout = LockTimeout::Never;
        self
    }

    /// Validate the settings
    pub fn validate(&self) -> crate::Result<()> {
        if self.unlock_timeout == LockTimeout::After(Duration::ZERO) {
            return Err(Error::Config(
                "acquisition.unlock_timeout must be greater than zero; use \"never\" to disable auto-unlock"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Keys understood by `get` / `set`
    pub const KEYS: &'static [&'static str] = &["acquisition.unlock_timeout"];

    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var(CONFIG_DIR_ENV) {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("ras")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location, or defaults if absent
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, or defaults if the file doesn't exist
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.acquisition.validate()?;
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "acquisition.unlock_timeout" => Ok(self.acquisition.unlock_timeout.to_string()),
            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `ras config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "acquisition.unlock_timeout" => {
                let timeout: LockTimeout = value
                    .parse()
                    .with_context(|| format!("Invalid unlock timeout value: {}", value))?;
                let candidate = AcquisitionConfig {
                    unlock_timeout: timeout,
                };
                candidate.validate()?;
                self.acquisition = candidate;
            }
            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `ras config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        Self::KEYS
            .iter()
            .map(|key| Ok((key.to_string(), self.get(key)?)))
            .collect()
    }

    /// Reset configuration to defaults by removing the config file
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}
