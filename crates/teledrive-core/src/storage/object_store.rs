//! Placeholder providers for S3-style object stores (Cloudflare R2, Backblaze B2).
//!
//! They report availability from configuration and otherwise reject every
//! operation: `NotConfigured` without credentials, `NotImplemented` with them.

use teledrive_types::config::ObjectStoreConfig;
use teledrive_types::error::StorageError;
use teledrive_types::storage::{ProviderType, QuotaInfo, UploadResult};

use super::StorageProvider;

#[derive(Debug, Clone)]
pub struct ObjectStorageStub {
    provider: ProviderType,
    config: ObjectStoreConfig,
}

impl ObjectStorageStub {
    pub fn r2(config: ObjectStoreConfig) -> Self {
        Self {
            provider: ProviderType::R2,
            config,
        }
    }

    pub fn b2(config: ObjectStoreConfig) -> Self {
        Self {
            provider: ProviderType::B2,
            config,
        }
    }

    fn unsupported(&self, operation: &'static str) -> StorageError {
        if self.config.is_complete() {
            StorageError::NotImplemented {
                provider: self.provider,
                operation,
            }
        } else {
            StorageError::NotConfigured(self.provider)
        }
    }
}

impl StorageProvider for ObjectStorageStub {
    fn provider_type(&self) -> ProviderType {
        self.provider
    }

    fn is_available(&self) -> bool {
        self.config.is_complete()
    }

    async fn upload_file(&self, _data: &[u8], _filename: &str) -> Result<UploadResult, StorageError> {
        Err(self.unsupported("upload_file"))
    }

    async fn download_file(&self, _file_id: &str) -> Result<Vec<u8>, StorageError> {
        Err(self.unsupported("download_file"))
    }

    async fn get_download_url(&self, _file_id: &str) -> Result<String, StorageError> {
        Err(self.unsupported("get_download_url"))
    }

    async fn delete_file(&self, _file_id: &str) -> Result<bool, StorageError> {
        Err(self.unsupported("delete_file"))
    }

    async fn get_quota(&self) -> Result<Option<QuotaInfo>, StorageError> {
        Err(self.unsupported("get_quota"))
    }
}
