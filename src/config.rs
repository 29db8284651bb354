//! # Configuration Module
//!
//! This module defines configuration structures for the bot: Telegram and
//! Yandex credentials, local paths, sweep intervals and the recovery settings
//! used when talking to the remote disk.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

// Constants for default configuration
pub const DEFAULT_BASE_PATH: &str = "/RMRPreport";
pub const DEFAULT_REDIRECT_URI: &str = "https://oauth.yandex.ru/verification_code";
pub const DEFAULT_API_BASE: &str = "https://cloud-api.yandex.net";
pub const DEFAULT_OAUTH_BASE: &str = "https://oauth.yandex.ru";
pub const CLEANUP_INTERVAL_SECS: u64 = 30 * 60;
pub const FILE_RETENTION_SECS: u64 = 60 * 60;
pub const PENDING_TTL_SECS: u64 = 24 * 60 * 60;
pub const WIZARD_TTL_SECS: u64 = 60 * 60;

/// Recovery configuration for remote disk requests
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Extra attempts made after a request times out
    pub max_retries: u32,
    /// Timeout for a single HTTP request in seconds
    pub request_timeout_secs: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            request_timeout_secs: 30,
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60, // 1 minute
        }
    }
}

/// Yandex OAuth application and API endpoints
#[derive(Debug, Clone)]
pub struct YandexConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// REST API root, e.g. `https://cloud-api.yandex.net`
    pub api_base: String,
    /// OAuth server root, e.g. `https://oauth.yandex.ru`
    pub oauth_base: String,
}

impl Default for YandexConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            oauth_base: DEFAULT_OAUTH_BASE.to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bot_token: String,
    pub yandex: YandexConfig,
    /// Directory for downloaded photos awaiting upload
    pub photos_dir: PathBuf,
    /// JSON file holding per-user settings
    pub settings_file: PathBuf,
    /// Remote base folder used when the user did not pick one
    pub default_base_path: String,
    pub cleanup_interval_secs: u64,
    pub file_retention_secs: u64,
    pub pending_ttl_secs: u64,
    pub wizard_ttl_secs: u64,
    pub recovery: RecoveryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            yandex: YandexConfig::default(),
            photos_dir: PathBuf::from("./photos"),
            settings_file: PathBuf::from("./user_settings.json"),
            default_base_path: DEFAULT_BASE_PATH.to_string(),
            cleanup_interval_secs: CLEANUP_INTERVAL_SECS,
            file_retention_secs: FILE_RETENTION_SECS,
            pending_ttl_secs: PENDING_TTL_SECS,
            wizard_ttl_secs: WIZARD_TTL_SECS,
            recovery: RecoveryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// Unset keys take their defaults. The bot token is required, numeric
    /// values that fail to parse are reported as errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let bot_token = get("TELEGRAM_BOT_TOKEN")
            .or_else(|| get("TOKEN_BOT"))
            .ok_or_else(|| anyhow!("TELEGRAM_BOT_TOKEN must be set"))?;

        let number = |key: &str, default: u64| -> Result<u64> {
            match get(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("{key} must be a non-negative integer, got {raw:?}")),
                None => Ok(default),
            }
        };

        let yandex = YandexConfig {
            client_id: get("YANDEX_CLIENT_ID").unwrap_or(defaults.yandex.client_id),
            client_secret: get("YANDEX_CLIENT_SECRET").unwrap_or(defaults.yandex.client_secret),
            redirect_uri: get("YANDEX_REDIRECT_URI").unwrap_or(defaults.yandex.redirect_uri),
            api_base: get("YANDEX_API_BASE").unwrap_or(defaults.yandex.api_base),
            oauth_base: get("YANDEX_OAUTH_BASE").unwrap_or(defaults.yandex.oauth_base),
        };

        let recovery = RecoveryConfig {
            max_retries: number("DISK_MAX_RETRIES", defaults.recovery.max_retries.into())? as u32,
            request_timeout_secs: number(
                "DISK_REQUEST_TIMEOUT_SECS",
                defaults.recovery.request_timeout_secs,
            )?,
            circuit_breaker_threshold: number(
                "DISK_BREAKER_THRESHOLD",
                defaults.recovery.circuit_breaker_threshold.into(),
            )? as u32,
            circuit_breaker_reset_secs: number(
                "DISK_BREAKER_RESET_SECS",
                defaults.recovery.circuit_breaker_reset_secs,
            )?,
        };

        let default_base_path = get("DEFAULT_BASE_PATH")
            .map(|path| normalize_remote_path(&path))
            .unwrap_or(defaults.default_base_path);

        Ok(Self {
            bot_token,
            yandex,
            photos_dir: get("PHOTOS_DIR").map(PathBuf::from).unwrap_or(defaults.photos_dir),
            settings_file: get("SETTINGS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.settings_file),
            default_base_path,
            cleanup_interval_secs: number("CLEANUP_INTERVAL_SECS", defaults.cleanup_interval_secs)?,
            file_retention_secs: number("FILE_RETENTION_SECS", defaults.file_retention_secs)?,
            pending_ttl_secs: number("PENDING_TTL_SECS", defaults.pending_ttl_secs)?,
            wizard_ttl_secs: number("WIZARD_TTL_SECS", defaults.wizard_ttl_secs)?,
            recovery,
        })
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }

    pub fn file_retention(&self) -> Duration {
        Duration::from_secs(self.file_retention_secs)
    }

    pub fn pending_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.pending_ttl_secs as i64)
    }

    pub fn wizard_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.wizard_ttl_secs as i64)
    }
}

/// Make a user-supplied remote path absolute and drop a trailing slash
pub fn normalize_remote_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
