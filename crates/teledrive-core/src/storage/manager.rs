//! Storage manager: single entry point over all configured providers.
//!
//! Uploads walk the candidate list (primary, then fallbacks in configured
//! order). Unavailable providers are skipped, failing providers are logged
//! and passed over, and the first success is returned tagged with the
//! provider that served it. No retries happen here; those already ran
//! inside the bot pool.

use std::collections::HashMap;

use tracing::{error, info, warn};

use teledrive_types::bot::BotStatusInfo;
use teledrive_types::error::StorageError;
use teledrive_types::storage::{
    AttemptOutcome, ManagedUpload, ProviderAttempt, ProviderStatus, ProviderType, QuotaInfo,
    StorageConfig, StorageStatus, UploadResult,
};

use super::{ProviderAdapter, StorageProvider};

#[derive(Debug)]
pub struct StorageManager {
    config: StorageConfig,
    providers: HashMap<ProviderType, ProviderAdapter>,
}

impl StorageManager {
    /// Take ownership of already constructed adapters.
    ///
    /// Adapters are keyed by their provider type; a later adapter of the same
    /// type replaces an earlier one.
    pub fn new(config: StorageConfig, adapters: Vec<ProviderAdapter>) -> Self {
        let config = config.normalized();
        let providers: HashMap<_, _> = adapters
            .into_iter()
            .map(|a| (a.provider_type(), a))
            .collect();

        let manager = Self { config, providers };
        info!(
            primary = %manager.config.primary,
            fallbacks = ?manager.config.fallback,
            available = ?manager.get_available_providers(),
            "Storage manager initialized"
        );
        if manager.config.replication_enabled {
            warn!("Replication is enabled in config but not supported yet; ignoring");
        }
        manager
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn provider(&self, provider: ProviderType) -> Option<&ProviderAdapter> {
        self.providers.get(&provider)
    }

    fn available(&self, provider: ProviderType) -> Option<&ProviderAdapter> {
        self.provider(provider).filter(|a| a.is_available())
    }

    fn require(&self, provider: ProviderType) -> Result<&ProviderAdapter, StorageError> {
        self.provider(provider)
            .ok_or(StorageError::NotConfigured(provider))
    }

    /// Upload through the primary provider, falling back in configured order.
    ///
    /// An empty file is refused before any provider is asked.
    pub async fn upload_with_fallback(
        &self,
        data: &[u8],
        filename: &str,
    ) -> Result<ManagedUpload, StorageError> {
        if data.is_empty() {
            return Err(StorageError::EmptyFile);
        }

        let mut attempts: Vec<ProviderAttempt> = Vec::new();

        for provider in self.config.candidates() {
            let Some(adapter) = self.available(provider) else {
                attempts.push(ProviderAttempt {
                    provider,
                    outcome: AttemptOutcome::Unavailable,
                });
                continue;
            };

            match adapter.upload_file(data, filename).await {
                Ok(result) => {
                    if provider != self.config.primary {
                        warn!(
                            used_provider = %provider,
                            primary = %self.config.primary,
                            filename,
                            "Upload served by fallback provider"
                        );
                    }
                    return Ok(ManagedUpload {
                        result,
                        used_provider: provider,
                    });
                }
                Err(err) => {
                    warn!(
                        provider = %provider,
                        filename,
                        error = %err,
                        "Storage provider failed, trying next"
                    );
                    attempts.push(ProviderAttempt {
                        provider,
                        outcome: AttemptOutcome::Failed {
                            error: err.to_string(),
                        },
                    });
                }
            }
        }

        error!(
            filename,
            attempts = %attempts
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
            "No storage provider could take the upload"
        );
        Err(StorageError::NoProvidersAvailable { attempts })
    }

    /// Registered providers that report themselves available.
    pub fn get_available_providers(&self) -> Vec<ProviderType> {
        ProviderType::ALL
            .into_iter()
            .filter(|p| self.available(*p).is_some())
            .collect()
    }

    pub fn get_status(&self) -> StorageStatus {
        let status = |provider: ProviderType| ProviderStatus {
            provider,
            available: self.available(provider).is_some(),
        };
        StorageStatus {
            primary: status(self.config.primary),
            fallbacks: self.config.fallback.iter().copied().map(status).collect(),
            replication_enabled: self.config.replication_enabled,
        }
    }

    /// Bot health of the Telegram provider; empty when it is not configured.
    pub fn bot_status(&self) -> Vec<BotStatusInfo> {
        self.provider(ProviderType::Telegram)
            .and_then(ProviderAdapter::as_telegram)
            .map(|t| t.pool().get_bot_status())
            .unwrap_or_default()
    }

    pub async fn download(
        &self,
        provider: ProviderType,
        file_id: &str,
    ) -> Result<Vec<u8>, StorageError> {
        self.require(provider)?.download_file(file_id).await
    }

    pub async fn get_download_url(
        &self,
        provider: ProviderType,
        file_id: &str,
    ) -> Result<String, StorageError> {
        self.require(provider)?.get_download_url(file_id).await
    }

    pub async fn delete_file(
        &self,
        provider: ProviderType,
        file_id: &str,
    ) -> Result<bool, StorageError> {
        self.require(provider)?.delete_file(file_id).await
    }

    pub async fn get_quota(&self, provider: ProviderType) -> Result<Option<QuotaInfo>, StorageError> {
        self.require(provider)?.get_quota().await
    }

    /// Make a previously persisted upload downloadable again in this process.
    pub fn restore_manifest(&self, upload: &UploadResult) -> Result<String, StorageError> {
        match self.require(upload.provider)? {
            ProviderAdapter::Telegram(t) => t.pool().register_manifest(&upload.chunks),
            _ => Err(StorageError::NotImplemented {
                provider: upload.provider,
                operation: "restore_manifest",
            }),
        }
    }
}
