//! Provider-neutral storage contract.
//!
//! Every backend exposes the same six operations. The concrete backends form
//! a closed set, wrapped by [`ProviderAdapter`]; [`StorageManager`] owns one
//! adapter per configured provider and walks primary then fallbacks on upload.

pub mod adapter;
pub mod manager;
pub mod object_store;
pub mod telegram;

use std::future::Future;

use teledrive_types::error::StorageError;
use teledrive_types::storage::{ProviderType, QuotaInfo, UploadResult};

pub use adapter::ProviderAdapter;
pub use manager::StorageManager;
pub use object_store::ObjectStorageStub;
pub use telegram::TelegramStorage;

/// Uniform storage backend contract.
pub trait StorageProvider: Send + Sync {
    fn provider_type(&self) -> ProviderType;

    /// Capability check from configuration alone. Never touches the network.
    fn is_available(&self) -> bool;

    fn upload_file(
        &self,
        data: &[u8],
        filename: &str,
    ) -> impl Future<Output = Result<UploadResult, StorageError>> + Send;

    fn download_file(
        &self,
        file_id: &str,
    ) -> impl Future<Output = Result<Vec<u8>, StorageError>> + Send;

    fn get_download_url(
        &self,
        file_id: &str,
    ) -> impl Future<Output = Result<String, StorageError>> + Send;

    fn delete_file(&self, file_id: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// `None` when the backend has no quota visibility.
    fn get_quota(&self) -> impl Future<Output = Result<Option<QuotaInfo>, StorageError>> + Send;
}
