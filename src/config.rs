// JSON file-based preferences
// Stored in the user config directory, created with defaults on first run

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to get user config directory")]
    NoConfigDir,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An extra host directory mounted into every server container
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MountMapping {
    /// Absolute path on the host
    pub host_path: String,
    /// Mount point inside the container
    pub container_path: String,
}

/// User preferences, loaded once per invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Port used when none is given on the command line
    pub default_port: u16,
    /// Image the server containers are created from
    pub image: String,
    /// Container runtime binary (docker or a drop-in replacement)
    pub runtime_bin: String,
    /// Extra directory mappings added to every `start`
    #[serde(default)]
    pub mounts: Vec<MountMapping>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_port: 8080,
            image: "ccf/php:dev".to_string(),
            runtime_bin: "docker".to_string(),
            mounts: Vec::new(),
        }
    }
}

impl Config {
    /// Path of the preferences file (`<config dir>/apds/config.json`)
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(base.join("apds").join("config.json"))
    }

    /// Load the preferences file, writing one with defaults if it is absent
    pub fn load_or_create() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        Self::load_or_create_at(path)
    }

    fn load_or_create_at(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let config = Self::default();
            let contents = serde_json::to_string_pretty(&config)?;
            fs::write(&path, contents)?;
            info!(path = ?path, "Created default config file");
            return Ok(config);
        }

        let contents = fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&contents)?;
        debug!(path = ?path, "Loaded config");
        Ok(config)
    }
}
