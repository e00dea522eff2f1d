//! Telegram-backed storage provider.

use std::sync::Arc;

use tracing::debug;

use teledrive_types::error::StorageError;
use teledrive_types::storage::{ProviderType, QuotaInfo, UploadResult};

use super::StorageProvider;
use crate::bot::pool::BotPool;

/// Storage provider that delegates every operation to a [`BotPool`].
///
/// Downloads resolve the owning credential from the file's manifest, so the
/// file must be known to the pool (uploaded in this process or re-registered).
#[derive(Debug, Clone)]
pub struct TelegramStorage {
    pool: Arc<BotPool>,
}

impl TelegramStorage {
    pub fn new(pool: Arc<BotPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<BotPool> {
        &self.pool
    }

    fn owner_of(&self, file_id: &str) -> Result<String, StorageError> {
        self.pool
            .manifest(file_id)
            .and_then(|chunks| chunks.first().map(|c| c.provider_id.clone()))
            .ok_or_else(|| StorageError::UnknownFile(file_id.to_string()))
    }
}

impl StorageProvider for TelegramStorage {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Telegram
    }

    fn is_available(&self) -> bool {
        !self.pool.is_empty()
    }

    async fn upload_file(&self, data: &[u8], filename: &str) -> Result<UploadResult, StorageError> {
        self.pool.upload_large_file(data, filename).await
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, StorageError> {
        let owner = self.owner_of(file_id)?;
        self.pool.download_file(file_id, &owner).await
    }

    async fn get_download_url(&self, file_id: &str) -> Result<String, StorageError> {
        let owner = self.owner_of(file_id)?;
        self.pool.get_download_url(file_id, &owner).await
    }

    /// Telegram offers no reliable way to delete a posted document, so this
    /// only drops the file from the in-process index and always reports
    /// success. Real deletion happens in the metadata layer.
    async fn delete_file(&self, file_id: &str) -> Result<bool, StorageError> {
        let indexed = self.pool.forget(file_id);
        debug!(file_id, indexed, "Telegram delete is metadata-only");
        Ok(true)
    }

    async fn get_quota(&self) -> Result<Option<QuotaInfo>, StorageError> {
        Ok(None)
    }
}
