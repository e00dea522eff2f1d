//! Chunked transfer of one logical file against one credential.
//!
//! Payloads larger than the chunk size are split into fixed-size, ordered
//! slices and posted as separate documents. Every backend call is bounded by
//! a timeout and wrapped in [`retry_with_cancel`]. Chunks of one file are
//! uploaded sequentially; downloads reassemble strictly by `chunk_index` and
//! verify each chunk's size and SHA-256 before any bytes are returned.

use std::future::Future;
use std::ops::Range;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use teledrive_types::bot::BotCredential;
use teledrive_types::config::{TELEGRAM_MAX_DOWNLOAD_BYTES, TelegramConfig};
use teledrive_types::error::{StorageError, TransportError};
use teledrive_types::storage::{ChunkInfo, ProviderType, UploadResult};

use crate::retry::{RetryPolicy, retry_with_cancel};
use crate::transport::BoxFileTransport;

/// Size and timeout settings for chunked transfers.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Maximum bytes per stored unit.
    pub chunk_size: u64,
    /// Bound on a single document upload or download.
    pub transfer_timeout: Duration,
    /// Bound on a single metadata call (URL resolution).
    pub metadata_timeout: Duration,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            chunk_size: TELEGRAM_MAX_DOWNLOAD_BYTES,
            transfer_timeout: Duration::from_secs(30),
            metadata_timeout: Duration::from_secs(15),
        }
    }
}

impl From<&TelegramConfig> for TransferSettings {
    fn from(config: &TelegramConfig) -> Self {
        Self {
            chunk_size: config.chunk_size_bytes.max(1),
            transfer_timeout: Duration::from_secs(config.upload_timeout_secs),
            metadata_timeout: Duration::from_secs(config.metadata_timeout_secs),
        }
    }
}

/// Deterministic chunk boundaries for a buffer of `len` bytes.
///
/// Yields `ceil(len / chunk_size)` ranges, the last one possibly short.
pub fn plan_chunks(len: usize, chunk_size: usize) -> Vec<Range<usize>> {
    let chunk_size = chunk_size.max(1);
    (0..len)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(len))
        .collect()
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Check a chunk manifest and return it sorted by `chunk_index`.
///
/// Indices must be contiguous from zero, no chunk may be empty, and every
/// chunk must belong to the same upload and the same credential.
pub fn validate_manifest(chunks: &[ChunkInfo]) -> Result<Vec<ChunkInfo>, StorageError> {
    let Some(head) = chunks.first() else {
        return Err(StorageError::InvalidManifest("manifest has no chunks".to_string()));
    };

    let mut sorted = chunks.to_vec();
    sorted.sort_by_key(|c| c.chunk_index);

    for (expected, chunk) in sorted.iter().enumerate() {
        if chunk.chunk_index as usize != expected {
            return Err(StorageError::InvalidManifest(format!(
                "expected chunk {expected}, found chunk {}",
                chunk.chunk_index
            )));
        }
        if chunk.chunk_size == 0 {
            return Err(StorageError::InvalidManifest(format!(
                "chunk {} is empty",
                chunk.chunk_index
            )));
        }
        if chunk.provider_id != head.provider_id {
            return Err(StorageError::InvalidManifest(format!(
                "chunk {} stored by '{}', chunk 0 by '{}'",
                chunk.chunk_index, chunk.provider_id, head.provider_id
            )));
        }
        if chunk.upload_id != head.upload_id {
            return Err(StorageError::InvalidManifest(format!(
                "chunk {} belongs to a different upload",
                chunk.chunk_index
            )));
        }
    }
    Ok(sorted)
}

async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| TransportError::Timeout(limit))?
}

/// Hash `data` on the blocking pool, handing the buffer back with its digest.
async fn digest_blocking(index: u32, data: Vec<u8>) -> Result<(Vec<u8>, String), TransportError> {
    tokio::task::spawn_blocking(move || {
        let digest = sha256_hex(&data);
        (data, digest)
    })
    .await
    .map_err(|e| TransportError::ChunkIntegrity {
        index,
        reason: format!("digest task failed: {e}"),
    })
}

async fn verify_chunk(chunk: &ChunkInfo, bytes: Vec<u8>) -> Result<Vec<u8>, TransportError> {
    if bytes.len() as u64 != chunk.chunk_size {
        return Err(TransportError::ChunkIntegrity {
            index: chunk.chunk_index,
            reason: format!("expected {} bytes, got {}", chunk.chunk_size, bytes.len()),
        });
    }
    // Manifests recorded without digests are accepted on size alone.
    if chunk.sha256.is_empty() {
        return Ok(bytes);
    }
    let (bytes, digest) = digest_blocking(chunk.chunk_index, bytes).await?;
    if digest != chunk.sha256 {
        return Err(TransportError::ChunkIntegrity {
            index: chunk.chunk_index,
            reason: "sha256 mismatch".to_string(),
        });
    }
    Ok(bytes)
}

/// Moves one logical file to or from one credential.
#[derive(Debug, Clone)]
pub struct ChunkedClient {
    transport: BoxFileTransport,
    retry: RetryPolicy,
    settings: TransferSettings,
}

impl ChunkedClient {
    pub fn new(transport: BoxFileTransport, retry: RetryPolicy, settings: TransferSettings) -> Self {
        Self {
            transport,
            retry,
            settings,
        }
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    /// Upload `data` through `bot`, splitting it when it exceeds the chunk size.
    ///
    /// Chunks are tagged with a generated upload id and their index (in the
    /// document caption) and posted in order. The first chunk that cannot be
    /// stored after retries fails the whole upload. Empty payloads are refused
    /// before any backend call.
    pub async fn upload(
        &self,
        data: &[u8],
        filename: &str,
        bot: &BotCredential,
        cancel: &CancellationToken,
    ) -> Result<UploadResult, TransportError> {
        if data.is_empty() {
            return Err(TransportError::EmptyPayload);
        }
        let chunk_size = usize::try_from(self.settings.chunk_size).unwrap_or(usize::MAX);
        let ranges = plan_chunks(data.len(), chunk_size);
        let total = ranges.len() as u32;
        let is_chunked = total > 1;
        let upload_id = Uuid::now_v7().to_string();

        debug!(
            bot = %bot.id,
            upload_id = %upload_id,
            bytes = data.len(),
            chunks = total,
            "Starting upload"
        );

        let mut chunks = Vec::with_capacity(ranges.len());
        for (index, range) in ranges.into_iter().enumerate() {
            let index = index as u32;
            let slice = &data[range];
            let part_name = if is_chunked {
                format!("{filename}.part{index:04}")
            } else {
                filename.to_string()
            };
            let caption = format!("{upload_id}:{index}:{total}");
            let target = format!("{}:send_document#{index}", bot.id);

            let remote = retry_with_cancel(&self.retry, &target, cancel, || {
                with_timeout(
                    self.settings.transfer_timeout,
                    self.transport.send_document(bot, slice, &part_name, &caption),
                )
            })
            .await?;
            let (_, sha256) = digest_blocking(index, slice.to_vec()).await?;

            chunks.push(ChunkInfo {
                chunk_index: index,
                file_id: remote.file_id,
                upload_id: upload_id.clone(),
                chunk_size: slice.len() as u64,
                provider_id: bot.id.clone(),
                sha256,
            });
        }

        let file_id = chunks
            .first()
            .map(|c| c.file_id.clone())
            .unwrap_or_default();

        info!(
            bot = %bot.id,
            file_id = %file_id,
            upload_id = %upload_id,
            chunks = total,
            bytes = data.len(),
            "Upload complete"
        );

        Ok(UploadResult {
            file_id,
            provider: ProviderType::Telegram,
            is_chunked,
            total_chunks: total,
            total_size: data.len() as u64,
            chunks,
        })
    }

    /// Fetch every chunk of `manifest` through `bot` and reassemble in index
    /// order. Any unrecoverable chunk fails the whole download.
    pub async fn download(
        &self,
        manifest: &[ChunkInfo],
        bot: &BotCredential,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, StorageError> {
        let chunks = self.owned_manifest(manifest, bot)?;
        let total_size = chunks.iter().map(|c| c.chunk_size).sum::<u64>();
        let mut buffer = Vec::with_capacity(usize::try_from(total_size).unwrap_or(0));

        for chunk in &chunks {
            let target = format!("{}:fetch_document#{}", bot.id, chunk.chunk_index);
            let bytes = retry_with_cancel(&self.retry, &target, cancel, || {
                with_timeout(
                    self.settings.transfer_timeout,
                    self.transport.fetch_document(bot, &chunk.file_id),
                )
            })
            .await?;
            let bytes = verify_chunk(chunk, bytes).await?;
            buffer.extend_from_slice(&bytes);
        }

        debug!(
            bot = %bot.id,
            chunks = chunks.len(),
            bytes = buffer.len(),
            "Download complete"
        );
        Ok(buffer)
    }

    /// Direct URL for a single-chunk file. Chunked files have none.
    pub async fn get_download_url(
        &self,
        manifest: &[ChunkInfo],
        bot: &BotCredential,
    ) -> Result<String, StorageError> {
        let chunks = self.owned_manifest(manifest, bot)?;
        if chunks.len() > 1 {
            return Err(StorageError::ChunkedUrlUnsupported {
                total_chunks: chunks.len() as u32,
            });
        }
        let head = &chunks[0];
        let target = format!("{}:resolve_download_url", bot.id);
        let url = retry_with_cancel(&self.retry, &target, &CancellationToken::new(), || {
            with_timeout(
                self.settings.metadata_timeout,
                self.transport.resolve_download_url(bot, &head.file_id),
            )
        })
        .await?;
        Ok(url)
    }

    fn owned_manifest(
        &self,
        manifest: &[ChunkInfo],
        bot: &BotCredential,
    ) -> Result<Vec<ChunkInfo>, StorageError> {
        let chunks = validate_manifest(manifest)?;
        if chunks[0].provider_id != bot.id {
            return Err(StorageError::InvalidManifest(format!(
                "chunks were stored by '{}', not '{}'",
                chunks[0].provider_id, bot.id
            )));
        }
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    fn bot(id: &str) -> BotCredential {
        BotCredential::new(id, id, "123:TOKEN", "-100")
    }

    fn client(mock: &MockTransport, chunk_size: u64) -> ChunkedClient {
        ChunkedClient::new(
            BoxFileTransport::new(mock.clone()),
            RetryPolicy::default(),
            TransferSettings {
                chunk_size,
                ..TransferSettings::default()
            },
        )
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_plan_chunks_boundaries() {
        assert!(plan_chunks(0, 10).is_empty());
        assert_eq!(plan_chunks(10, 10), vec![0..10]);
        assert_eq!(plan_chunks(25, 10), vec![0..10, 10..20, 20..25]);
        assert_eq!(plan_chunks(3, 0), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_plan_chunks_count_is_ceiling() {
        for len in [1usize, 9, 10, 11, 99, 100, 101] {
            assert_eq!(plan_chunks(len, 10).len(), len.div_ceil(10));
        }
    }

    #[test]
    fn test_sha256_hex_known_value() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_validate_manifest_sorts_and_rejects_gaps() {
        let chunk = |index: u32, provider: &str| ChunkInfo {
            chunk_index: index,
            file_id: format!("f{index}"),
            upload_id: "u".to_string(),
            chunk_size: 1,
            provider_id: provider.to_string(),
            sha256: String::new(),
        };

        let sorted = validate_manifest(&[chunk(1, "bot1"), chunk(0, "bot1")]).unwrap();
        assert_eq!(sorted[0].chunk_index, 0);

        assert!(validate_manifest(&[]).is_err());
        assert!(validate_manifest(&[chunk(0, "bot1"), chunk(2, "bot1")]).is_err());
        assert!(validate_manifest(&[chunk(1, "bot1")]).is_err());
        assert!(validate_manifest(&[chunk(0, "bot1"), chunk(1, "bot2")]).is_err());

        let mut empty = chunk(0, "bot1");
        empty.chunk_size = 0;
        assert!(matches!(
            validate_manifest(&[empty]),
            Err(StorageError::InvalidManifest(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_file_is_single_chunk() {
        let mock = MockTransport::new();
        let client = client(&mock, 100);
        let data = payload(100);

        let result = client
            .upload(&data, "notes.txt", &bot("bot1"), &CancellationToken::new())
            .await
            .unwrap();
        assert!(!result.is_chunked);
        assert_eq!(result.total_chunks, 1);
        assert_eq!(result.file_id, result.chunks[0].file_id);
        assert!(result.is_consistent());
        assert_eq!(mock.send_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_large_file_round_trip() {
        let mock = MockTransport::new();
        let client = client(&mock, 64);
        let data = payload(1000);
        let bot = bot("bot1");

        let result = client
            .upload(&data, "video.mp4", &bot, &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.is_chunked);
        assert_eq!(result.total_chunks, 16);
        assert!(result.is_consistent());
        assert!(result.chunks.iter().all(|c| c.provider_id == "bot1"));
        assert!(result.chunks.iter().all(|c| c.upload_id == result.chunks[0].upload_id));

        let mut shuffled = result.chunks.clone();
        shuffled.reverse();
        let restored = client
            .download(&shuffled, &bot, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(restored, data);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_file_is_refused_without_backend_call() {
        let mock = MockTransport::new();
        let client = client(&mock, 64);

        let err = client
            .upload(&[], "empty.bin", &bot("bot1"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::EmptyPayload));
        assert!(err.is_payload_error());
        assert_eq!(mock.send_calls(), 0);
        assert_eq!(mock.stored_documents(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_send_times_out_and_is_retried() {
        let mock = MockTransport::new();
        let client = client(&mock, 64);
        mock.hang_next_send();
        let started = tokio::time::Instant::now();

        let result = client
            .upload(&payload(10), "a.bin", &bot("bot1"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.total_chunks, 1);
        assert_eq!(mock.send_calls(), 2);
        assert_eq!(mock.stored_documents(), 1);
        // 30s transfer timeout plus one jittered 1s backoff.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(30_800), "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(31_200), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_chunk_failure_is_retried() {
        let mock = MockTransport::new();
        let client = client(&mock, 10);
        mock.fail_next(TransportError::Network("reset".to_string()));

        let result = client
            .upload(&payload(30), "a.bin", &bot("bot1"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.total_chunks, 3);
        assert_eq!(mock.send_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_chunk_failure_aborts_upload() {
        let mock = MockTransport::new();
        let client = client(&mock, 10);
        mock.fail_next(TransportError::Unauthorized("blocked".to_string()));

        let err = client
            .upload(&payload(30), "a.bin", &bot("bot1"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Unauthorized(_)));
        assert_eq!(mock.send_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupted_chunk_fails_download() {
        let mock = MockTransport::new();
        let client = client(&mock, 10);
        let bot = bot("bot1");
        let result = client
            .upload(&payload(25), "a.bin", &bot, &CancellationToken::new())
            .await
            .unwrap();

        let mut tampered = payload(10);
        tampered[0] ^= 0xff;
        mock.replace_document(&result.chunks[1].file_id, tampered);

        let err = client
            .download(&result.chunks, &bot, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Transport(TransportError::ChunkIntegrity { index: 1, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_with_wrong_credential_is_rejected() {
        let mock = MockTransport::new();
        let client = client(&mock, 10);
        let result = client
            .upload(&payload(5), "a.bin", &bot("bot1"), &CancellationToken::new())
            .await
            .unwrap();

        let err = client
            .download(&result.chunks, &bot("bot2"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidManifest(_)));
        assert_eq!(mock.fetch_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_url_single_chunk_only() {
        let mock = MockTransport::new();
        let client = client(&mock, 10);
        let bot = bot("bot1");

        let single = client
            .upload(&payload(8), "a.bin", &bot, &CancellationToken::new())
            .await
            .unwrap();
        let url = client.get_download_url(&single.chunks, &bot).await.unwrap();
        assert!(url.starts_with("mock://bot1/"));
        assert_eq!(mock.url_calls(), 1);

        let chunked = client
            .upload(&payload(25), "b.bin", &bot, &CancellationToken::new())
            .await
            .unwrap();
        let err = client
            .get_download_url(&chunked.chunks, &bot)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::ChunkedUrlUnsupported { total_chunks: 3 }
        ));
        assert_eq!(mock.url_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_upload_stops_before_sending() {
        let mock = MockTransport::new();
        let client = client(&mock, 10);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .upload(&payload(30), "a.bin", &bot("bot1"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Cancelled));
        assert_eq!(mock.send_calls(), 0);
    }
}
