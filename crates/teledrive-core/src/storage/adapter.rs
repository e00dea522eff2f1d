//! Closed set of storage providers behind one type.

use teledrive_types::error::StorageError;
use teledrive_types::storage::{ProviderType, QuotaInfo, UploadResult};

use super::{ObjectStorageStub, StorageProvider, TelegramStorage};

/// One configured storage backend.
#[derive(Debug, Clone)]
pub enum ProviderAdapter {
    Telegram(TelegramStorage),
    R2(ObjectStorageStub),
    B2(ObjectStorageStub),
}

impl ProviderAdapter {
    pub fn as_telegram(&self) -> Option<&TelegramStorage> {
        match self {
            ProviderAdapter::Telegram(t) => Some(t),
            _ => None,
        }
    }
}

impl StorageProvider for ProviderAdapter {
    fn provider_type(&self) -> ProviderType {
        match self {
            ProviderAdapter::Telegram(p) => p.provider_type(),
            ProviderAdapter::R2(p) | ProviderAdapter::B2(p) => p.provider_type(),
        }
    }

    fn is_available(&self) -> bool {
        match self {
            ProviderAdapter::Telegram(p) => p.is_available(),
            ProviderAdapter::R2(p) | ProviderAdapter::B2(p) => p.is_available(),
        }
    }

    async fn upload_file(&self, data: &[u8], filename: &str) -> Result<UploadResult, StorageError> {
        match self {
            ProviderAdapter::Telegram(p) => p.upload_file(data, filename).await,
            ProviderAdapter::R2(p) | ProviderAdapter::B2(p) => p.upload_file(data, filename).await,
        }
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, StorageError> {
        match self {
            ProviderAdapter::Telegram(p) => p.download_file(file_id).await,
            ProviderAdapter::R2(p) | ProviderAdapter::B2(p) => p.download_file(file_id).await,
        }
    }

    async fn get_download_url(&self, file_id: &str) -> Result<String, StorageError> {
        match self {
            ProviderAdapter::Telegram(p) => p.get_download_url(file_id).await,
            ProviderAdapter::R2(p) | ProviderAdapter::B2(p) => p.get_download_url(file_id).await,
        }
    }

    async fn delete_file(&self, file_id: &str) -> Result<bool, StorageError> {
        match self {
            ProviderAdapter::Telegram(p) => p.delete_file(file_id).await,
            ProviderAdapter::R2(p) | ProviderAdapter::B2(p) => p.delete_file(file_id).await,
        }
    }

    async fn get_quota(&self) -> Result<Option<QuotaInfo>, StorageError> {
        match self {
            ProviderAdapter::Telegram(p) => p.get_quota().await,
            ProviderAdapter::R2(p) | ProviderAdapter::B2(p) => p.get_quota().await,
        }
    }
}
