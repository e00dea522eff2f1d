//! Configuration loader for Teledrive.
//!
//! Reads `config.toml` from the config directory (`~/.teledrive/` unless
//! `TELEDRIVE_CONFIG_DIR` says otherwise) or an explicit path, overlays
//! environment variables, then validates the result.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use teledrive_types::bot::MAX_BOTS;
use teledrive_types::config::{AppConfig, BotConfig, LogFormat, TELEGRAM_MAX_DOWNLOAD_BYTES};
use teledrive_types::error::ConfigError;
use teledrive_types::storage::ProviderType;

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "TELEDRIVE_CONFIG_DIR";

/// Resolve the directory holding `config.toml`.
pub fn resolve_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".teledrive"))
        .unwrap_or_else(|| PathBuf::from(".teledrive"))
}

/// Load, overlay and validate the full configuration.
///
/// With an explicit `path`, a missing or malformed file is an error. Without
/// one, `{config_dir}/config.toml` is optional and a malformed file falls
/// back to defaults with a warning.
pub async fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_config_file(path).await?,
        None => load_default_config_file(&resolve_config_dir().join("config.toml")).await,
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&mut config)?;
    Ok(config)
}

/// Parse a config file that must exist.
pub async fn load_config_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path).await?;
    toml::from_str(&content)
        .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))
}

async fn load_default_config_file(path: &Path) -> AppConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!("No config.toml found at {}, using defaults", path.display());
            return AppConfig::default();
        }
        Err(err) => {
            warn!("Failed to read {}: {err}, using defaults", path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            warn!("Failed to parse {}: {err}, using defaults", path.display());
            AppConfig::default()
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Overlay environment variables on `config`.
///
/// `lookup` abstracts `std::env::var` so tests can supply a fixed map.
/// Bot tokens from the environment replace any tokens from the file.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| non_empty(lookup(key));

    let env_tokens: Vec<String> = std::iter::once("TELEGRAM_BOT_TOKEN".to_string())
        .chain((1..=MAX_BOTS).map(|i| format!("TELEGRAM_BOT_TOKEN_{i}")))
        .filter_map(|key| get(&key))
        .collect();
    if !env_tokens.is_empty() {
        let mut seen = Vec::new();
        config.telegram.bots = env_tokens
            .into_iter()
            .filter(|t| {
                let fresh = !seen.contains(t);
                if fresh {
                    seen.push(t.clone());
                }
                fresh
            })
            .map(|token| BotConfig { name: None, token })
            .collect();
    }
    if let Some(chat_id) = get("TELEGRAM_CHAT_ID") {
        config.telegram.chat_id = Some(chat_id);
    }
    if let Some(url) = get("TELEGRAM_API_BASE_URL") {
        config.telegram.api_base_url = url;
    }

    let object_store_vars = [
        (
            &mut config.r2,
            ["R2_ACCOUNT_ID", "R2_ACCESS_KEY_ID", "R2_SECRET_ACCESS_KEY", "R2_BUCKET_NAME"],
        ),
        (
            &mut config.b2,
            [
                "B2_APPLICATION_ID",
                "B2_ACCESS_KEY_ID",
                "B2_SECRET_ACCESS_KEY",
                "B2_BUCKET_NAME",
            ],
        ),
    ];
    for (store, [account, key_id, secret, bucket]) in object_store_vars {
        if let Some(v) = get(account) {
            store.account_id = Some(v);
        }
        if let Some(v) = get(key_id) {
            store.access_key_id = Some(v);
        }
        if let Some(v) = get(secret) {
            store.secret_access_key = Some(v);
        }
        if let Some(v) = get(bucket) {
            store.bucket = Some(v);
        }
    }

    if let Some(primary) = get("STORAGE_PRIMARY") {
        config.storage.primary = primary.parse::<ProviderType>().map_err(ConfigError::Invalid)?;
    }
    if let Some(fallback) = get("STORAGE_FALLBACK") {
        config.storage.fallback = fallback
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<ProviderType>)
            .collect::<Result<_, _>>()
            .map_err(ConfigError::Invalid)?;
    }
    if let Some(replication) = get("STORAGE_REPLICATION") {
        config.storage.replication_enabled = parse_bool(&replication)?;
    }

    if let Some(format) = get("TELEDRIVE_LOG_FORMAT") {
        config.logging.format = format.parse::<LogFormat>().map_err(ConfigError::Invalid)?;
    }
    if let Some(level) = get("TELEDRIVE_LOG_LEVEL") {
        config.logging.level = level;
    }
    Ok(())
}

fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid(format!("invalid boolean: '{other}'"))),
    }
}

/// Normalize `config` in place and reject values that cannot work.
pub fn validate(config: &mut AppConfig) -> Result<(), ConfigError> {
    config.telegram.bots.retain(|b| !b.token.trim().is_empty());
    if config.telegram.bots.len() > MAX_BOTS {
        warn!(
            configured = config.telegram.bots.len(),
            max = MAX_BOTS,
            "Too many bot tokens configured, ignoring the extras"
        );
        config.telegram.bots.truncate(MAX_BOTS);
    }

    config.storage = std::mem::take(&mut config.storage).normalized();

    let chunk = config.telegram.chunk_size_bytes;
    if chunk == 0 || chunk > TELEGRAM_MAX_DOWNLOAD_BYTES {
        return Err(ConfigError::Invalid(format!(
            "telegram.chunk_size_bytes must be between 1 and {TELEGRAM_MAX_DOWNLOAD_BYTES}, got {chunk}"
        )));
    }
    if config.telegram.upload_timeout_secs == 0 || config.telegram.metadata_timeout_secs == 0 {
        return Err(ConfigError::Invalid("telegram timeouts must be positive".to_string()));
    }
    if config.telegram.manifest_index_capacity == 0 {
        return Err(ConfigError::Invalid(
            "telegram.manifest_index_capacity must be at least 1".to_string(),
        ));
    }

    let retry = &config.retry;
    if retry.max_attempts == 0 {
        return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".to_string()));
    }
    if !(retry.multiplier.is_finite() && retry.multiplier >= 1.0) {
        return Err(ConfigError::Invalid(format!(
            "retry.multiplier must be >= 1.0, got {}",
            retry.multiplier
        )));
    }
    if !(0.0..=1.0).contains(&retry.jitter_fraction) {
        return Err(ConfigError::Invalid(format!(
            "retry.jitter_fraction must be within 0.0..=1.0, got {}",
            retry.jitter_fraction
        )));
    }
    if retry.base_delay_ms > retry.max_delay_ms {
        return Err(ConfigError::Invalid(
            "retry.base_delay_ms must not exceed retry.max_delay_ms".to_string(),
        ));
    }
    Ok(())
}
