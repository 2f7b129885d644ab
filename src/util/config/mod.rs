//! Rill configuration
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high → low):
//! 1. CLI arguments
//! 2. Environment variables (RILL_LOG)
//! 3. Project-level (./rill.toml)
//! 4. User-level (~/.config/rill/config.toml)
//! 5. Default values
//! ```
//!
//! Only the first file found is read; files are not merged.
//!
//! # Usage
//!
//! ```rust
//! use rill::util::config::RillConfig;
//!
//! let config: RillConfig = toml::from_str("[scheduler]\nread_buffer_size = 512").unwrap();
//! assert_eq!(config.scheduler_config().read_buffer_size, 512);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runtime::scheduler::SchedulerConfig;
use crate::util::logger::{self, LogLevel};

/// Project-level configuration file name.
pub const PROJECT_FILE: &str = "rill.toml";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RillConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub scheduler: SchedulerSection,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
}

/// Event loop settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulerSection {
    /// Longest readiness wait in milliseconds; absent waits indefinitely
    #[serde(default)]
    pub poll_timeout_ms: Option<u64>,
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    /// 0 drains the queue between polls
    #[serde(default)]
    pub max_tasks_per_tick: usize,
}

fn default_read_buffer_size() -> usize {
    SchedulerConfig::default().read_buffer_size
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            poll_timeout_ms: None,
            read_buffer_size: default_read_buffer_size(),
            max_tasks_per_tick: 0,
        }
    }
}

impl RillConfig {
    /// Event loop configuration described by this file.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_timeout: self.scheduler.poll_timeout_ms.map(Duration::from_millis),
            read_buffer_size: self.scheduler.read_buffer_size.max(1),
            max_tasks_per_tick: self.scheduler.max_tasks_per_tick,
        }
    }

    /// Apply environment overrides.
    pub fn apply_env(&mut self) {
        if let Some(level) = logger::env_level() {
            self.log.level = level;
        }
    }
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join("rill"));
    }

    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".config").join("rill"));
    }

    None
}

/// Get the user config file path (~/.config/rill/config.toml)
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Read and parse one configuration file.
pub fn load_file(path: &Path) -> Result<RillConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
    toml::from_str(&content).map_err(ConfigError::ParseError)
}

/// Load the configuration.
///
/// An explicit path must exist. Otherwise `./rill.toml`, then the user
/// config file, then defaults. Environment overrides apply last.
pub fn load(explicit: Option<&Path>) -> Result<RillConfig, ConfigError> {
    let mut config = match explicit {
        Some(path) => load_file(path)?,
        None => {
            let project = PathBuf::from(PROJECT_FILE);
            let mut candidates = std::iter::once(project).chain(get_config_path());
            match candidates.find(|p| p.is_file()) {
                Some(path) => load_file(&path)?,
                None => RillConfig::default(),
            }
        }
    };
    config.apply_env();
    Ok(config)
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => write!(f, "IO error reading {}: {}", path.display(), e),
            ConfigError::ParseError(e) => write!(f, "Config parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
