//! Wires configuration into a ready [`StorageManager`].
//!
//! Every adapter is constructed eagerly; one without credentials simply
//! reports itself unavailable.

use std::sync::Arc;

use tracing::warn;

use teledrive_core::bot::health::HealthPolicy;
use teledrive_core::bot::pool::BotPool;
use teledrive_core::chunked::{ChunkedClient, TransferSettings};
use teledrive_core::retry::RetryPolicy;
use teledrive_core::storage::{ObjectStorageStub, ProviderAdapter, StorageManager, TelegramStorage};
use teledrive_core::transport::BoxFileTransport;
use teledrive_types::bot::BotCredential;
use teledrive_types::config::{AppConfig, TelegramConfig};
use teledrive_types::error::ConfigError;

use crate::telegram::TelegramBotApi;

/// Credentials `bot1`..`botN` in configuration order.
///
/// Without a destination chat no credential is usable, so none are built.
pub fn build_credentials(config: &TelegramConfig) -> Vec<BotCredential> {
    if !config.is_complete() {
        if !config.bots.is_empty() {
            warn!(
                bots = config.bots.len(),
                "Bot tokens configured without TELEGRAM_CHAT_ID; Telegram storage disabled"
            );
        }
        return Vec::new();
    }
    let chat_id = config.chat_id.as_deref().unwrap_or_default();

    config
        .bots
        .iter()
        .enumerate()
        .map(|(i, bot)| {
            let id = format!("bot{}", i + 1);
            let name = bot.name.clone().unwrap_or_else(|| id.clone());
            BotCredential::new(id, name, bot.token.clone(), chat_id)
        })
        .collect()
}

/// Build the Telegram bot pool from configuration.
pub fn build_bot_pool(config: &AppConfig) -> Result<BotPool, ConfigError> {
    let api = TelegramBotApi::new(config.telegram.api_base_url.clone())
        .map_err(|e| ConfigError::Invalid(format!("telegram transport: {e}")))?;
    let client = ChunkedClient::new(
        BoxFileTransport::new(api),
        RetryPolicy::from(&config.retry),
        TransferSettings::from(&config.telegram),
    );
    Ok(BotPool::new(
        build_credentials(&config.telegram),
        client,
        HealthPolicy::from(&config.telegram),
    )
    .with_manifest_capacity(config.telegram.manifest_index_capacity))
}

/// Construct every adapter and the manager that owns them.
pub fn build_storage_manager(config: &AppConfig) -> Result<StorageManager, ConfigError> {
    let pool = build_bot_pool(config)?;
    let adapters = vec![
        ProviderAdapter::Telegram(TelegramStorage::new(Arc::new(pool))),
        ProviderAdapter::R2(ObjectStorageStub::r2(config.r2.clone())),
        ProviderAdapter::B2(ObjectStorageStub::b2(config.b2.clone())),
    ];
    Ok(StorageManager::new(config.storage.clone(), adapters))
}
