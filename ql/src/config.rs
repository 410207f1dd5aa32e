//! ql configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::quantum::PacingConfig;

/// Main ql configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Quantum pacing
    pub pacing: PacingConfig,

    /// Executor used to resume between quanta
    pub executor: ExecutorKind,

    /// Log level when --log-level is not given
    pub log_level: Option<String>,
}

/// Project-local config, looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = ".quantloop.yml";

/// Directory under the platform config dir holding the user config
pub const USER_CONFIG_DIR: &str = "quantloop";

/// User config file name inside [`USER_CONFIG_DIR`]
pub const USER_CONFIG_FILE: &str = "quantloop.yml";

impl Config {
    /// Load the explicit file, or the first readable candidate, or defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::candidates().iter().filter(|path| path.exists()) {
            match Self::load_from_file(candidate) {
                Ok(config) => return Ok(config),
                Err(e) => warn!(path = %candidate.display(), error = %e, "Config::load: skipping unreadable config"),
            }
        }

        info!("Config::load: no config file found, using defaults");
        Ok(Self::default())
    }

    /// Implicit config locations, most specific first
    pub fn candidates() -> Vec<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        let user = dirs::config_dir().map(|dir| dir.join(USER_CONFIG_DIR).join(USER_CONFIG_FILE));
        std::iter::once(local).chain(user).collect()
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        debug!(path = %path.display(), ?config, "Config::load_from_file: loaded");
        Ok(config)
    }
}

/// Which executor resumes the iterator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// Process-wide queue drained by the command's own loop
    Main,
    /// Dedicated worker thread
    Serial,
    /// Tasks on the tokio runtime
    #[default]
    Tokio,
}

impl std::fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Serial => write!(f, "serial"),
            Self::Tokio => write!(f, "tokio"),
        }
    }
}

impl std::str::FromStr for ExecutorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "main" => Ok(Self::Main),
            "serial" => Ok(Self::Serial),
            "tokio" => Ok(Self::Tokio),
            _ => Err(format!("Unknown executor: {}. Use: main, serial, or tokio", s)),
        }
    }
}
