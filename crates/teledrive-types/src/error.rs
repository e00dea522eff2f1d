use std::time::Duration;

use thiserror::Error;

use crate::storage::{ProviderAttempt, ProviderType};

/// Errors from a single backend network operation.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("credential rejected: {0}")]
    Unauthorized(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("payload of {size} bytes exceeds backend limit of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("payload is empty")]
    EmptyPayload,

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("chunk {index} failed integrity check: {reason}")]
    ChunkIntegrity { index: u32, reason: String },

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<TransportError>,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl TransportError {
    /// Whether the backoff executor should try again.
    ///
    /// Retryable: network failures, timeouts, 5xx, rate limits.
    /// Everything else (auth, malformed requests, integrity) aborts immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Network(..)
                | TransportError::Timeout(..)
                | TransportError::Server { .. }
                | TransportError::RateLimited { .. }
        )
    }

    /// Whether this error (or the last error behind an exhausted retry) is a rate limit.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            TransportError::RateLimited { .. } => true,
            TransportError::RetriesExhausted { last, .. } => last.is_rate_limit(),
            _ => false,
        }
    }

    /// Backend-provided "retry after" hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TransportError::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            TransportError::RetriesExhausted { last, .. } => last.retry_after(),
            _ => None,
        }
    }

    /// Whether the payload itself was refused. Such errors would recur on
    /// every credential and say nothing about the one that reported them.
    pub fn is_payload_error(&self) -> bool {
        match self {
            TransportError::PayloadTooLarge { .. } | TransportError::EmptyPayload => true,
            TransportError::RetriesExhausted { last, .. } => last.is_payload_error(),
            _ => false,
        }
    }

    /// Whether the credential itself was rejected (blocked or deauthorized bot).
    pub fn is_credential_failure(&self) -> bool {
        match self {
            TransportError::Unauthorized(..) => true,
            TransportError::RetriesExhausted { last, .. } => last.is_credential_failure(),
            _ => false,
        }
    }
}

/// Errors surfaced by bot pool, provider adapters and the storage manager.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage provider '{0}' is not configured")]
    NotConfigured(ProviderType),

    #[error("storage provider '{provider}' does not implement {operation} yet")]
    NotImplemented {
        provider: ProviderType,
        operation: &'static str,
    },

    #[error("cannot store an empty file")]
    EmptyFile,

    #[error("no Telegram bots available")]
    NoBotsAvailable,

    #[error("all Telegram bots failed after {attempts} attempt(s): {last_error}")]
    AllBotsFailed {
        attempts: usize,
        last_error: TransportError,
    },

    #[error("unknown file '{0}'")]
    UnknownFile(String),

    #[error("unknown bot credential '{0}'")]
    UnknownCredential(String),

    #[error("file is split into {total_chunks} chunks and has no single download URL")]
    ChunkedUrlUnsupported { total_chunks: u32 },

    #[error("invalid chunk manifest: {0}")]
    InvalidManifest(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("no storage providers available")]
    NoProvidersAvailable { attempts: Vec<ProviderAttempt> },
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
