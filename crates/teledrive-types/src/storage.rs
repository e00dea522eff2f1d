//! Storage types for Teledrive.
//!
//! These types model the provider-neutral upload contract: which backend
//! handled a file, how it was split into chunks, and what the caller must
//! persist to fetch it again.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Backend provider kinds known to the storage manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Telegram Bot API, via the bot pool.
    Telegram,
    /// Cloudflare R2 object storage (not yet implemented).
    R2,
    /// Backblaze B2 object storage (not yet implemented).
    B2,
}

impl ProviderType {
    pub const ALL: [ProviderType; 3] = [ProviderType::Telegram, ProviderType::R2, ProviderType::B2];
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderType::Telegram => write!(f, "telegram"),
            ProviderType::R2 => write!(f, "r2"),
            ProviderType::B2 => write!(f, "b2"),
        }
    }
}

impl FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "telegram" => Ok(ProviderType::Telegram),
            "r2" => Ok(ProviderType::R2),
            "b2" => Ok(ProviderType::B2),
            other => Err(format!("invalid provider type: '{other}'")),
        }
    }
}

/// One stored slice of a logical file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    /// Zero-based ordinal within the logical file.
    pub chunk_index: u32,
    /// Backend reference of this chunk (Telegram `file_id`).
    pub file_id: String,
    /// Generated identifier of the owning logical file, shared by all its chunks.
    pub upload_id: String,
    /// Size of this chunk in bytes.
    pub chunk_size: u64,
    /// Id of the credential that stored this chunk.
    pub provider_id: String,
    /// Lowercase hex SHA-256 of the chunk bytes.
    pub sha256: String,
}

/// Outcome of a single logical upload.
///
/// Invariants: `total_chunks == chunks.len()`, and `is_chunked == false`
/// implies `total_chunks == 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Handle of the logical file: the backend reference of chunk 0.
    pub file_id: String,
    /// Adapter that handled the upload.
    pub provider: ProviderType,
    pub is_chunked: bool,
    pub total_chunks: u32,
    /// Sum of all chunk sizes.
    pub total_size: u64,
    /// Chunks in upload (index) order.
    pub chunks: Vec<ChunkInfo>,
}

impl UploadResult {
    /// Credential that stored the chunks, if any chunk exists.
    pub fn credential_id(&self) -> Option<&str> {
        self.chunks.first().map(|c| c.provider_id.as_str())
    }

    /// Check the structural invariants of this result.
    pub fn is_consistent(&self) -> bool {
        let counts_match = self.total_chunks as usize == self.chunks.len();
        let chunk_flag_ok = self.is_chunked || self.total_chunks == 1;
        let ordered = self
            .chunks
            .iter()
            .enumerate()
            .all(|(i, c)| c.chunk_index as usize == i);
        let sizes_match = self.chunks.iter().map(|c| c.chunk_size).sum::<u64>() == self.total_size;
        let head_matches = self
            .chunks
            .first()
            .is_some_and(|c| c.file_id == self.file_id);
        counts_match && chunk_flag_ok && ordered && sizes_match && head_matches
    }
}

/// An upload served by the storage manager, tagged with the provider that
/// actually handled it (which may be a fallback).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedUpload {
    #[serde(flatten)]
    pub result: UploadResult,
    pub used_provider: ProviderType,
}

/// Provider quota, in bytes. `remaining == limit - used`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaInfo {
    pub used: u64,
    pub limit: u64,
    pub remaining: u64,
}

impl QuotaInfo {
    pub fn new(used: u64, limit: u64) -> Self {
        Self {
            used,
            limit,
            remaining: limit.saturating_sub(used),
        }
    }
}

/// Provider selection policy, fixed for the lifetime of a storage manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_primary")]
    pub primary: ProviderType,
    /// Ordered fallbacks; never contains `primary`.
    #[serde(default)]
    pub fallback: Vec<ProviderType>,
    /// Reserved for dual-write; currently inert.
    #[serde(default)]
    pub replication_enabled: bool,
}

fn default_primary() -> ProviderType {
    ProviderType::Telegram
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            fallback: Vec::new(),
            replication_enabled: false,
        }
    }
}

impl StorageConfig {
    /// Drop duplicates and any occurrence of the primary from the fallback list,
    /// preserving first-seen order.
    pub fn normalized(mut self) -> Self {
        let mut seen = vec![self.primary];
        self.fallback.retain(|p| {
            if seen.contains(p) {
                false
            } else {
                seen.push(*p);
                true
            }
        });
        self
    }

    /// Primary followed by fallbacks, in trial order.
    pub fn candidates(&self) -> Vec<ProviderType> {
        std::iter::once(self.primary)
            .chain(self.fallback.iter().copied().filter(|p| *p != self.primary))
            .collect()
    }
}

/// Availability snapshot of one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub provider: ProviderType,
    pub available: bool,
}

/// Storage manager snapshot for monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageStatus {
    pub primary: ProviderStatus,
    pub fallbacks: Vec<ProviderStatus>,
    pub replication_enabled: bool,
}

/// Why a provider was passed over during an upload-with-fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Unavailable,
    Failed { error: String },
}

/// One step of the fallback walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    pub provider: ProviderType,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

impl fmt::Display for ProviderAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            AttemptOutcome::Unavailable => write!(f, "{}: unavailable", self.provider),
            AttemptOutcome::Failed { error } => write!(f, "{}: {error}", self.provider),
        }
    }
}
