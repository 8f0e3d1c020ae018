//! Configuration management for cadsim CLI
//!
//! Stores run defaults in ~/.config/cadsim/config.toml

use anyhow::{Context, Result};
use cadsim::SimulationConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = "cadsim";
const CONFIG_FILE: &str = "config.toml";

/// CLI Configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Scenario used when `run` is given no path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_scenario: Option<PathBuf>,
    /// Defaults for every run
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join(CONFIG_DIR);
        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Load config from the given file or the default location; missing means defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;

        config
            .simulation
            .validate()
            .with_context(|| format!("Invalid simulation settings in {:?}", path))?;

        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<PathBuf> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory {:?}", dir))?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        Ok(path)
    }

    /// Scenario from the argument, falling back to the configured default
    pub fn scenario_path(&self, arg: Option<PathBuf>) -> Option<PathBuf> {
        arg.or_else(|| self.default_scenario.clone())
    }
}
