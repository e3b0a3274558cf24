//! Application configuration management.
//!
//! Configuration is stored at `~/.config/burpee-bootcamp/config.json`.
//! Every field can be overridden from the environment (`BOOTCAMP_*`), which
//! includes values loaded from a `.env` file by the binary.

use std::path::PathBuf;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::gateway::validate_version;

/// Application name used for config/data/cache directory paths
const APP_NAME: &str = "burpee-bootcamp";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Cache version shipped with this build. Bump whenever cached assets change,
/// or returning users keep the old ones.
pub const DEFAULT_VERSION: &str = "v18";

const DEFAULT_ORIGIN: &str = "http://localhost:8000";

/// Static assets (sounds, icons) live here unless configured otherwise.
const DEFAULT_ASSETS_DIR: &str = "public";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub origin: String,
    pub version: String,
    pub data_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub assets_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            version: DEFAULT_VERSION.to_string(),
            data_dir: None,
            cache_dir: None,
            assets_dir: None,
        }
    }
}

impl Config {
    /// Load the config file (defaults if absent), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };
        let config = config.with_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot be used as-is. The version names a cache
    /// directory, so it must be a single plain path component.
    pub fn validate(&self) -> Result<()> {
        validate_version(&self.version).context("Invalid version")?;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `BOOTCAMP_*` overrides read through `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(origin) = lookup("BOOTCAMP_ORIGIN") {
            self.origin = origin;
        }
        if let Some(version) = lookup("BOOTCAMP_VERSION") {
            self.version = version;
        }
        if let Some(dir) = lookup("BOOTCAMP_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup("BOOTCAMP_CACHE_DIR") {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup("BOOTCAMP_ASSETS_DIR") {
            self.assets_dir = Some(PathBuf::from(dir));
        }
        self
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn origin_url(&self) -> Result<Url> {
        Url::parse(&self.origin).with_context(|| format!("Invalid origin: {}", self.origin))
    }

    /// Where the local store document lives.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Root of the cache generations.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir =
            dirs::cache_dir().ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.assets_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSETS_DIR))
    }
}
