//! Configuration types for Teledrive.
//!
//! `AppConfig` represents the top-level `config.toml`. Every field has a
//! default so an empty file (or none at all) yields a usable configuration;
//! secrets normally arrive through environment variables instead.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::storage::StorageConfig;

/// Telegram Bot API upload limit for `sendDocument` (50 MB).
pub const TELEGRAM_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Telegram Bot API download limit for `getFile` (20 MB). Chunks must fit
/// under this or they could be stored but never fetched back.
pub const TELEGRAM_MAX_DOWNLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Default chunk size: the largest slice that can still be downloaded.
pub const DEFAULT_CHUNK_SIZE_BYTES: u64 = TELEGRAM_MAX_DOWNLOAD_BYTES;

/// Public Bot API endpoint.
pub const TELEGRAM_API_BASE_URL: &str = "https://api.telegram.org";

/// Default number of chunk manifests the bot pool keeps in memory.
pub const DEFAULT_MANIFEST_INDEX_CAPACITY: usize = 10_000;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub r2: ObjectStoreConfig,
    #[serde(default)]
    pub b2: ObjectStoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One configured bot token.
#[derive(Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Optional display name; defaults to the generated id.
    #[serde(default)]
    pub name: Option<String>,
    pub token: String,
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("name", &self.name)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Telegram transport and bot pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Shared destination chat for every bot.
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub bots: Vec<BotConfig>,
    #[serde(default = "default_chunk_size_bytes")]
    pub chunk_size_bytes: u64,
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,
    #[serde(default = "default_metadata_timeout_secs")]
    pub metadata_timeout_secs: u64,
    /// Consecutive failures before a bot is deactivated.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// How long a deactivated bot sits out before probation.
    #[serde(default = "default_recovery_window_secs")]
    pub recovery_window_secs: u64,
    /// Manifests kept by the pool for in-process downloads; the oldest is
    /// evicted first. Evicted files can be re-registered from their manifest.
    #[serde(default = "default_manifest_index_capacity")]
    pub manifest_index_capacity: usize,
}

fn default_api_base_url() -> String {
    TELEGRAM_API_BASE_URL.to_string()
}

fn default_chunk_size_bytes() -> u64 {
    DEFAULT_CHUNK_SIZE_BYTES
}

fn default_upload_timeout_secs() -> u64 {
    30
}

fn default_metadata_timeout_secs() -> u64 {
    15
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_window_secs() -> u64 {
    300
}

fn default_manifest_index_capacity() -> usize {
    DEFAULT_MANIFEST_INDEX_CAPACITY
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            chat_id: None,
            bots: Vec::new(),
            chunk_size_bytes: default_chunk_size_bytes(),
            upload_timeout_secs: default_upload_timeout_secs(),
            metadata_timeout_secs: default_metadata_timeout_secs(),
            failure_threshold: default_failure_threshold(),
            recovery_window_secs: default_recovery_window_secs(),
            manifest_index_capacity: default_manifest_index_capacity(),
        }
    }
}

impl TelegramConfig {
    /// The adapter is usable only with at least one token and a destination chat.
    pub fn is_complete(&self) -> bool {
        !self.bots.is_empty() && self.chat_id.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// Backoff settings shared by every network call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Jitter as a fraction of the computed delay (0.2 = ±20%).
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,
}

fn default_max_attempts() -> u32 {
    6
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter_fraction() -> f64 {
    0.2
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter_fraction: default_jitter_fraction(),
        }
    }
}

/// Credentials for an S3-style object store (R2 or B2).
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// R2 account id / B2 application id.
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Bucket (or container) name.
    #[serde(default)]
    pub bucket: Option<String>,
}

impl ObjectStoreConfig {
    /// All four values present and non-empty.
    pub fn is_complete(&self) -> bool {
        [
            &self.account_id,
            &self.access_key_id,
            &self.secret_access_key,
            &self.bucket,
        ]
        .iter()
        .all(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

impl fmt::Debug for ObjectStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreConfig")
            .field("account_id", &self.account_id)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("bucket", &self.bucket)
            .finish()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("invalid log format: '{other}'")),
        }
    }
}

/// Logging settings consumed by `teledrive-observe`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Bridge spans to OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_log_level(),
            otel: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ProviderType;

    #[test]
    fn test_app_config_default_values() {
        let config = AppConfig::default();
        assert_eq!(config.storage.primary, ProviderType::Telegram);
        assert_eq!(config.telegram.chunk_size_bytes, 20 * 1024 * 1024);
        assert_eq!(config.telegram.upload_timeout_secs, 30);
        assert_eq!(config.telegram.metadata_timeout_secs, 15);
        assert_eq!(config.telegram.failure_threshold, 5);
        assert_eq!(config.retry.max_attempts, 6);
        assert_eq!(config.retry.base_delay_ms, 1_000);
        assert_eq!(config.retry.max_delay_ms, 10_000);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_app_config_deserialize_with_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.telegram.bots.is_empty());
        assert!(!config.telegram.is_complete());
        assert_eq!(config.telegram.api_base_url, TELEGRAM_API_BASE_URL);
        assert_eq!(
            config.telegram.manifest_index_capacity,
            DEFAULT_MANIFEST_INDEX_CAPACITY
        );
        assert!(!config.r2.is_complete());
    }

    #[test]
    fn test_app_config_deserialize_with_values() {
        let toml_str = r#"
[storage]
primary = "telegram"
fallback = ["r2", "b2"]

[telegram]
chat_id = "-100123"
chunk_size_bytes = 1048576

[[telegram.bots]]
name = "main"
token = "111:AAA"

[[telegram.bots]]
token = "222:BBB"

[retry]
max_attempts = 3

[r2]
account_id = "acct"
access_key_id = "key"
secret_access_key = "secret"
bucket = "files"

[logging]
format = "json"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.storage.fallback, vec![ProviderType::R2, ProviderType::B2]);
        assert_eq!(config.telegram.bots.len(), 2);
        assert_eq!(config.telegram.bots[0].name.as_deref(), Some("main"));
        assert!(config.telegram.is_complete());
        assert_eq!(config.telegram.chunk_size_bytes, 1_048_576);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.max_delay_ms, 10_000);
        assert!(config.r2.is_complete());
        assert!(!config.b2.is_complete());
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let bot = BotConfig {
            name: None,
            token: "999:SECRET".to_string(),
        };
        assert!(!format!("{bot:?}").contains("SECRET"));

        let store = ObjectStoreConfig {
            secret_access_key: Some("hunter2".to_string()),
            ..Default::default()
        };
        assert!(!format!("{store:?}").contains("hunter2"));
    }

    #[test]
    fn test_object_store_blank_value_is_incomplete() {
        let store = ObjectStoreConfig {
            account_id: Some("a".to_string()),
            access_key_id: Some("b".to_string()),
            secret_access_key: Some("c".to_string()),
            bucket: Some("  ".to_string()),
        };
        assert!(!store.is_complete());
    }
}
