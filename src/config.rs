use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::archiver::ArchiveSettings;
use crate::client::{MAX_BATCH_MODIFY_IDS, MAX_LIST_PAGE_SIZE};
use crate::error::ArchiveError;

type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Pause after each successful batch modify call
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Pause before re-measuring the inbox after a live round
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Pause before starting the next round
    #[serde(default = "default_round_delay_ms")]
    pub round_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            page_size: default_page_size(),
            batch_delay_ms: default_batch_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            round_delay_ms: default_round_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_token_cache")]
    pub token_cache: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_cache: default_token_cache(),
        }
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_page_size() -> u32 {
    500
}

fn default_batch_delay_ms() -> u64 {
    200
}

fn default_settle_delay_ms() -> u64 {
    2000
}

fn default_round_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_token_cache() -> PathBuf {
    PathBuf::from(".gmail-archiver/token.json")
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // A missing file means "all defaults"
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ArchiveError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ArchiveError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ArchiveError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ArchiveError::Config(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| ArchiveError::Config(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        validate_batch_size(self.archive.batch_size)?;

        if self.archive.page_size == 0 {
            return Err(ArchiveError::Config(
                "archive.page_size must be at least 1".to_string(),
            ));
        }
        if self.archive.page_size > MAX_LIST_PAGE_SIZE {
            return Err(ArchiveError::Config(format!(
                "archive.page_size cannot exceed {} (Gmail API limit)",
                MAX_LIST_PAGE_SIZE
            )));
        }

        if self.archive.request_timeout_secs == 0 {
            return Err(ArchiveError::Config(
                "archive.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.auth.token_cache.as_os_str().is_empty() {
            return Err(ArchiveError::Config(
                "auth.token_cache cannot be empty".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Loop settings for the archiver; the batch size is passed per run
    pub fn archive_settings(&self) -> ArchiveSettings {
        ArchiveSettings {
            page_size: self.archive.page_size,
            batch_delay: Duration::from_millis(self.archive.batch_delay_ms),
            settle_delay: Duration::from_millis(self.archive.settle_delay_ms),
            round_delay: Duration::from_millis(self.archive.round_delay_ms),
            ..ArchiveSettings::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.archive.request_timeout_secs)
    }
}

/// Batch sizes must fit one batchModify call
pub fn validate_batch_size(batch_size: usize) -> Result<()> {
    if batch_size == 0 {
        return Err(ArchiveError::Config(
            "batch size must be at least 1".to_string(),
        ));
    }
    if batch_size > MAX_BATCH_MODIFY_IDS {
        return Err(ArchiveError::Config(format!(
            "batch size cannot exceed {} (Gmail batchModify limit)",
            MAX_BATCH_MODIFY_IDS
        )));
    }
    Ok(())
}
