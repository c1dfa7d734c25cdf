use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "HealthLog";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Longest managed file name (`{visit}_{attachment}_{name}`), in characters.
pub const DEFAULT_MAX_NAME_LEN: usize = 100;

/// Default number of suggestions returned for autocomplete fields.
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Get the application data directory
/// ~/HealthLog/ on all platforms, or ./HealthLog when no home directory is known
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Directory holding one SQLite file per user
pub fn data_dir() -> PathBuf {
    app_data_dir().join("data")
}

/// Root of the managed attachment tree
pub fn archive_dir() -> PathBuf {
    app_data_dir().join("attachments")
}

pub fn config_path() -> PathBuf {
    app_data_dir().join(CONFIG_FILE_NAME)
}

pub fn default_log_filter() -> &'static str {
    "healthlog_lib=info,warn"
}

/// Where managed attachment copies live and how long their names may be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    pub archive_root: PathBuf,
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,
}

impl ArchiveConfig {
    pub fn new(archive_root: impl Into<PathBuf>) -> Self {
        Self {
            archive_root: archive_root.into(),
            max_name_len: DEFAULT_MAX_NAME_LEN,
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self::new(archive_dir())
    }
}

fn default_max_name_len() -> usize {
    DEFAULT_MAX_NAME_LEN
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub archive: ArchiveConfig,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default)]
    pub log_filter: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: data_dir(),
            archive: ArchiveConfig::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            log_filter: None,
        }
    }
}

impl AppConfig {
    /// Config rooted at a single directory (tests, portable installs).
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            data_dir: root.join("data"),
            archive: ArchiveConfig::new(root.join("attachments")),
            history_limit: DEFAULT_HISTORY_LIMIT,
            log_filter: None,
        }
    }

    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(default_log_filter())
    }
}
