use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};

const APP_DIR: &str = "tender-alert";
const BOT_TOKEN_ENV: &str = "TENDER_ALERT_BOT_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub bot_token: Option<String>,

    #[serde(default = "default_check_interval")]
    pub check_interval_minutes: u32,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_send_concurrency")]
    pub send_concurrency: usize,

    #[serde(default)]
    pub source: SourceConfig,
}

/// Which upstream shape tenders are ingested from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SourceConfig {
    Stream(StreamConfig),
    Bulk(BulkConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    #[serde(default = "default_lookback")]
    pub lookback_minutes: u32,

    #[serde(default = "default_detail_concurrency")]
    pub detail_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkConfig {
    pub archive_url: String,
    pub username: Option<String>,
    pub password: Option<String>,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    #[serde(default = "default_header_scan_bytes")]
    pub header_scan_bytes: usize,

    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// A cached archive older than this is downloaded again.
    #[serde(default = "default_archive_max_age")]
    pub archive_max_age_minutes: u64,
}

fn data_dir() -> PathBuf {
    let dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn default_db_path() -> String {
    data_dir().join("tenders.db").to_string_lossy().to_string()
}

fn default_cache_dir() -> String {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .to_string_lossy()
        .to_string()
}

fn default_check_interval() -> u32 {
    15
}

fn default_http_timeout() -> u64 {
    30
}

fn default_send_concurrency() -> usize {
    4
}

fn default_feed_url() -> String {
    "https://zakupki.gov.ru/epz/order/extendedsearch/rss.html".to_string()
}

fn default_lookback() -> u32 {
    20
}

fn default_detail_concurrency() -> usize {
    4
}

fn default_header_scan_bytes() -> usize {
    4096
}

fn default_max_candidates() -> usize {
    200
}

fn default_archive_max_age() -> u64 {
    24 * 60
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            feed_url: default_feed_url(),
            lookback_minutes: default_lookback(),
            detail_concurrency: default_detail_concurrency(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Stream(StreamConfig::default())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            bot_token: None,
            check_interval_minutes: default_check_interval(),
            http_timeout_secs: default_http_timeout(),
            send_concurrency: default_send_concurrency(),
            source: SourceConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location, writing a default file on first run.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            Self::from_toml(&content)?
        } else {
            let config = Config::default();
            config.save_to(config_path)?;
            config
        };

        if let Ok(token) = std::env::var(BOT_TOKEN_ENV) {
            if !token.trim().is_empty() {
                config.bot_token = Some(token);
            }
        }

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.check_interval_minutes) * 60)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.check_interval_minutes == 0 {
            return Err(AppError::Config(
                "check_interval_minutes must be at least 1".to_string(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(AppError::Config("http_timeout_secs must be at least 1".to_string()));
        }
        // Entries published between two cycles must still be inside the window
        if let SourceConfig::Stream(stream) = &self.source {
            if stream.lookback_minutes < self.check_interval_minutes {
                return Err(AppError::Config(format!(
                    "lookback_minutes ({}) must be at least check_interval_minutes ({})",
                    stream.lookback_minutes, self.check_interval_minutes
                )));
            }
        }
        if let SourceConfig::Bulk(bulk) = &self.source {
            if bulk.archive_url.trim().is_empty() {
                return Err(AppError::Config("bulk source needs archive_url".to_string()));
            }
            if bulk.max_candidates == 0 {
                return Err(AppError::Config("max_candidates must be at least 1".to_string()));
            }
        }
        Ok(())
    }
}
