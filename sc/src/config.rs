//! streamchain settings and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::pipeline::DEFAULT_CHANNEL_CAPACITY;

/// Main streamchain settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Log level used when `--log-level` is not given
    pub log_level: Option<String>,

    /// Chain wiring
    pub pipeline: PipelineSettings,

    /// Download stage defaults
    pub download: DownloadSettings,
}

impl Settings {
    /// Load settings with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .streamchain.yml
        let local_config = PathBuf::from(".streamchain.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(settings) => return Ok(settings),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/streamchain/streamchain.yml
        if let Some(user_config) = user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(settings) => return Ok(settings),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed; `load` reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => std::iter::once(PathBuf::from(".streamchain.yml"))
                .chain(user_config_path())
                .collect(),
        };

        candidates
            .into_iter()
            .filter(|path| path.exists())
            .find_map(|path| Self::load_from_file(path).ok())
            .and_then(|settings| settings.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let settings: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(settings)
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("streamchain").join("streamchain.yml"))
}

/// Chain wiring settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PipelineSettings {
    /// Items buffered between two adjacent stages
    pub channel_capacity: usize,

    /// Bytes per chunk read by the file source
    pub read_chunk_size: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            read_chunk_size: 64 * 1024,
        }
    }
}

/// Download stage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DownloadSettings {
    /// Whole-request timeout, unless a step overrides it
    pub timeout_ms: u64,

    pub user_agent: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 300_000,
            user_agent: "streamchain".to_string(),
        }
    }
}
