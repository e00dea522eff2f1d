//! Round-robin bot pool with health-based failover.
//!
//! The pool makes up to ten Telegram credentials behave like one transport.
//! Uploads pick the next healthy credential by round-robin; a failed upload
//! is retried from scratch on the next distinct healthy credential until
//! every healthy credential has had one attempt. Downloads must name the
//! credential that stored the file, because chunks are bound to it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use teledrive_types::bot::{BotCredential, BotStatusInfo, MAX_BOTS};
use teledrive_types::config::DEFAULT_MANIFEST_INDEX_CAPACITY;
use teledrive_types::error::{StorageError, TransportError};
use teledrive_types::storage::{ChunkInfo, UploadResult};

use super::health::{HealthPolicy, HealthRegistry};
use crate::chunked::{ChunkedClient, validate_manifest};

/// Chunk manifests of recently stored files, oldest evicted first.
///
/// The caller persists every `UploadResult`; this index only saves a
/// round-trip to the metadata store for files handled by this process.
#[derive(Debug)]
struct ManifestIndex {
    entries: DashMap<String, Vec<ChunkInfo>>,
    order: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl ManifestIndex {
    fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    fn insert(&self, file_id: String, chunks: Vec<ChunkInfo>) {
        let mut order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        if self.entries.insert(file_id.clone(), chunks).is_some() {
            return;
        }
        order.push_back(file_id);
        while order.len() > self.capacity {
            if let Some(evicted) = order.pop_front() {
                self.entries.remove(&evicted);
                debug!(file_id = %evicted, "Evicted manifest from index");
            }
        }
    }

    fn get(&self, file_id: &str) -> Option<Vec<ChunkInfo>> {
        self.entries.get(file_id).map(|m| m.value().clone())
    }

    fn remove(&self, file_id: &str) -> bool {
        let mut order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = self.entries.remove(file_id).is_some();
        if removed {
            order.retain(|id| id != file_id);
        }
        removed
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Probation slot held by one upload attempt.
///
/// Dropped without [`ProbationClaim::settle`] (the attempt was cancelled or
/// its future abandoned), it hands the slot back so the credential can be
/// tried again.
struct ProbationClaim<'a> {
    registry: &'a HealthRegistry,
    bot_id: Option<String>,
}

impl ProbationClaim<'_> {
    /// An outcome was recorded; the registry state is final.
    fn settle(mut self) {
        self.bot_id = None;
    }
}

impl Drop for ProbationClaim<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.bot_id.take() {
            debug!(bot = %id, "Probation attempt ended without outcome, slot released");
            self.registry.release_probation(&id);
        }
    }
}

/// Load-balanced pool of Telegram credentials.
///
/// Owns the credential list and its health registry; nothing outside the
/// pool records outcomes for these credentials.
#[derive(Debug)]
pub struct BotPool {
    bots: Vec<Arc<BotCredential>>,
    registry: HealthRegistry,
    client: ChunkedClient,
    cursor: AtomicUsize,
    /// Logical `file_id` -> chunk manifest, for files this process knows about.
    manifests: ManifestIndex,
}

impl BotPool {
    /// Build a pool. Credentials beyond [`MAX_BOTS`] are dropped with a warning.
    pub fn new(mut bots: Vec<BotCredential>, client: ChunkedClient, policy: HealthPolicy) -> Self {
        if bots.len() > MAX_BOTS {
            warn!(
                configured = bots.len(),
                max = MAX_BOTS,
                "Too many bot credentials, ignoring the extras"
            );
            bots.truncate(MAX_BOTS);
        }
        let registry = HealthRegistry::new(
            bots.iter().map(|b| (b.id.clone(), b.name.clone())),
            policy,
        );
        info!(bots = bots.len(), transport = client.transport_name(), "Bot pool ready");
        Self {
            bots: bots.into_iter().map(Arc::new).collect(),
            registry,
            client,
            cursor: AtomicUsize::new(0),
            manifests: ManifestIndex::new(DEFAULT_MANIFEST_INDEX_CAPACITY),
        }
    }

    /// Keep at most `capacity` manifests in memory.
    pub fn with_manifest_capacity(mut self, capacity: usize) -> Self {
        self.manifests = ManifestIndex::new(capacity);
        self
    }

    pub fn len(&self) -> usize {
        self.bots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bots.is_empty()
    }

    pub fn registry(&self) -> &HealthRegistry {
        &self.registry
    }

    /// Look up a credential by id.
    pub fn credential(&self, id: &str) -> Result<Arc<BotCredential>, StorageError> {
        self.bots
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| StorageError::UnknownCredential(id.to_string()))
    }

    /// Next healthy credential by round-robin.
    ///
    /// Selection alone does not take a probation slot; only an upload attempt
    /// does, for as long as it runs.
    pub fn select_credential(&self) -> Result<Arc<BotCredential>, StorageError> {
        self.select_excluding(&[], false)
            .map(|(bot, _)| bot)
            .ok_or(StorageError::NoBotsAvailable)
    }

    /// Next healthy credential whose id is not in `tried`.
    ///
    /// With `claim`, a probation candidate is only returned if this call wins
    /// its single trial slot; otherwise the next candidate is considered.
    fn select_excluding(
        &self,
        tried: &[String],
        claim: bool,
    ) -> Option<(Arc<BotCredential>, ProbationClaim<'_>)> {
        let healthy: Vec<_> = self
            .registry
            .list_healthy()
            .into_iter()
            .filter(|b| !tried.contains(&b.id))
            .collect();
        if healthy.is_empty() {
            return None;
        }

        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        for offset in 0..healthy.len() {
            let candidate = &healthy[(start + offset) % healthy.len()];
            let held = if candidate.probation && claim {
                if !self.registry.claim_probation(&candidate.id) {
                    continue;
                }
                info!(bot = %candidate.id, "Trying bot on probation");
                Some(candidate.id.clone())
            } else {
                None
            };
            let guard = ProbationClaim {
                registry: &self.registry,
                bot_id: held,
            };
            if let Ok(bot) = self.credential(&candidate.id) {
                return Some((bot, guard));
            }
        }
        None
    }

    /// Upload a file through the pool, failing over across credentials.
    pub async fn upload_large_file(
        &self,
        data: &[u8],
        filename: &str,
    ) -> Result<UploadResult, StorageError> {
        self.upload_large_file_with_cancel(data, filename, &CancellationToken::new())
            .await
    }

    /// [`Self::upload_large_file`] that stops as soon as `cancel` fires.
    ///
    /// Each credential gets at most one whole-file attempt (with its own
    /// per-chunk retries). Fails with [`StorageError::NoBotsAvailable`] when
    /// no credential was selectable, or [`StorageError::AllBotsFailed`] once
    /// every selectable credential has failed. Empty files and payloads the
    /// backend refuses outright fail at once without touching bot health.
    pub async fn upload_large_file_with_cancel(
        &self,
        data: &[u8],
        filename: &str,
        cancel: &CancellationToken,
    ) -> Result<UploadResult, StorageError> {
        if data.is_empty() {
            return Err(StorageError::EmptyFile);
        }

        let mut tried: Vec<String> = Vec::new();
        let mut last_error: Option<TransportError> = None;

        while let Some((bot, claim)) = self.select_excluding(&tried, true) {
            tried.push(bot.id.clone());

            match self.client.upload(data, filename, &bot, cancel).await {
                Ok(result) => {
                    self.registry.record_success(&bot.id);
                    claim.settle();
                    self.manifests
                        .insert(result.file_id.clone(), result.chunks.clone());
                    return Ok(result);
                }
                Err(TransportError::Cancelled) => {
                    return Err(TransportError::Cancelled.into());
                }
                Err(err) if err.is_payload_error() => {
                    warn!(
                        bot = %bot.id,
                        filename,
                        bytes = data.len(),
                        error = %err,
                        "Payload refused, not failing over"
                    );
                    return Err(err.into());
                }
                Err(err) => {
                    warn!(
                        bot = %bot.id,
                        filename,
                        attempt = tried.len(),
                        error = %err,
                        "Upload failed on bot, failing over"
                    );
                    self.registry.record_failure(
                        &bot.id,
                        err.is_rate_limit(),
                        err.retry_after(),
                        &err.to_string(),
                    );
                    claim.settle();
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            None => Err(StorageError::NoBotsAvailable),
            Some(last_error) => Err(StorageError::AllBotsFailed {
                attempts: tried.len(),
                last_error,
            }),
        }
    }

    /// Download a file known to this pool through the credential that stored it.
    pub async fn download_file(&self, file_id: &str, bot_id: &str) -> Result<Vec<u8>, StorageError> {
        let manifest = self.manifest_or_unknown(file_id)?;
        self.download_manifest(&manifest, bot_id).await
    }

    /// Download from an explicit manifest, e.g. one read back from the
    /// metadata store.
    pub async fn download_manifest(
        &self,
        manifest: &[ChunkInfo],
        bot_id: &str,
    ) -> Result<Vec<u8>, StorageError> {
        let bot = self.credential(bot_id)?;
        let outcome = self
            .client
            .download(manifest, &bot, &CancellationToken::new())
            .await;
        self.record_read_outcome(bot_id, &outcome);
        outcome
    }

    /// Direct URL for a single-chunk file stored by `bot_id`.
    pub async fn get_download_url(&self, file_id: &str, bot_id: &str) -> Result<String, StorageError> {
        let manifest = self.manifest_or_unknown(file_id)?;
        let bot = self.credential(bot_id)?;
        let outcome = self.client.get_download_url(&manifest, &bot).await;
        self.record_read_outcome(bot_id, &outcome);
        outcome
    }

    /// Add a persisted manifest to the index. Returns the logical file id.
    pub fn register_manifest(&self, chunks: &[ChunkInfo]) -> Result<String, StorageError> {
        let chunks = validate_manifest(chunks)?;
        let owner = &chunks[0].provider_id;
        if !self.bots.iter().any(|b| &b.id == owner) {
            return Err(StorageError::UnknownCredential(owner.clone()));
        }
        let file_id = chunks[0].file_id.clone();
        debug!(file_id = %file_id, chunks = chunks.len(), "Registered manifest");
        self.manifests.insert(file_id.clone(), chunks);
        Ok(file_id)
    }

    pub fn manifest(&self, file_id: &str) -> Option<Vec<ChunkInfo>> {
        self.manifests.get(file_id)
    }

    /// Number of manifests currently indexed.
    pub fn indexed_files(&self) -> usize {
        self.manifests.len()
    }

    /// Drop a file from the index. Stored documents are left untouched.
    pub fn forget(&self, file_id: &str) -> bool {
        self.manifests.remove(file_id)
    }

    /// Health snapshot of every credential.
    pub fn get_bot_status(&self) -> Vec<BotStatusInfo> {
        self.registry.status()
    }

    fn manifest_or_unknown(&self, file_id: &str) -> Result<Vec<ChunkInfo>, StorageError> {
        self.manifest(file_id)
            .ok_or_else(|| StorageError::UnknownFile(file_id.to_string()))
    }

    /// Only backend failures count against a credential; integrity and
    /// manifest errors say nothing about its health.
    fn record_read_outcome<T>(&self, bot_id: &str, outcome: &Result<T, StorageError>) {
        match outcome {
            Ok(_) => self.registry.record_success(bot_id),
            Err(StorageError::Transport(err))
                if !matches!(
                    err,
                    TransportError::ChunkIntegrity { .. } | TransportError::Cancelled
                ) =>
            {
                self.registry.record_failure(
                    bot_id,
                    err.is_rate_limit(),
                    err.retry_after(),
                    &err.to_string(),
                );
            }
            Err(_) => {}
        }
    }
}
