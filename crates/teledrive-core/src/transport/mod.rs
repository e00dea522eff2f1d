//! Backend transport abstraction.
//!
//! A transport moves one opaque document to or from the backend using one
//! credential. It does no chunking, retrying or health bookkeeping; those are
//! layered on top by [`crate::chunked`] and [`crate::bot::pool`].
//! The Telegram Bot API implementation lives in `teledrive-infra`.

pub mod box_transport;
#[cfg(test)]
pub mod mock;

use std::future::Future;

use teledrive_types::bot::BotCredential;
use teledrive_types::error::TransportError;

pub use box_transport::{BoxFileTransport, FileTransportDyn};

/// Reference to one stored document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Opaque backend reference (Telegram `file_id`).
    pub file_id: String,
    /// Size reported by the backend, when it reports one.
    pub size: Option<u64>,
}

/// Single-document operations against the backend.
///
/// Uses native async fn in traits (RPITIT); wrap in [`BoxFileTransport`]
/// for dynamic dispatch.
pub trait FileTransport: Send + Sync {
    /// Short backend name used in log fields.
    fn name(&self) -> &str;

    /// Post `payload` as a document to the credential's destination chat.
    fn send_document(
        &self,
        bot: &BotCredential,
        payload: &[u8],
        filename: &str,
        caption: &str,
    ) -> impl Future<Output = Result<RemoteFile, TransportError>> + Send;

    /// Resolve a direct, time-limited URL for a stored document.
    fn resolve_download_url(
        &self,
        bot: &BotCredential,
        file_id: &str,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;

    /// Fetch the raw bytes of a stored document.
    fn fetch_document(
        &self,
        bot: &BotCredential,
        file_id: &str,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}
