//! Object-safe wrapper around [`FileTransport`].
//!
//! `FileTransportDyn` boxes the futures and is blanket-implemented for every
//! `FileTransport`; `BoxFileTransport` holds one behind an `Arc` so the
//! chunked client and the pool can share it cheaply.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use teledrive_types::bot::BotCredential;
use teledrive_types::error::TransportError;

use super::{FileTransport, RemoteFile};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Object-safe version of [`FileTransport`] with boxed futures.
pub trait FileTransportDyn: Send + Sync {
    fn name(&self) -> &str;

    fn send_document_boxed<'a>(
        &'a self,
        bot: &'a BotCredential,
        payload: &'a [u8],
        filename: &'a str,
        caption: &'a str,
    ) -> BoxFuture<'a, RemoteFile>;

    fn resolve_download_url_boxed<'a>(
        &'a self,
        bot: &'a BotCredential,
        file_id: &'a str,
    ) -> BoxFuture<'a, String>;

    fn fetch_document_boxed<'a>(
        &'a self,
        bot: &'a BotCredential,
        file_id: &'a str,
    ) -> BoxFuture<'a, Vec<u8>>;
}

impl<T: FileTransport> FileTransportDyn for T {
    fn name(&self) -> &str {
        FileTransport::name(self)
    }

    fn send_document_boxed<'a>(
        &'a self,
        bot: &'a BotCredential,
        payload: &'a [u8],
        filename: &'a str,
        caption: &'a str,
    ) -> BoxFuture<'a, RemoteFile> {
        Box::pin(self.send_document(bot, payload, filename, caption))
    }

    fn resolve_download_url_boxed<'a>(
        &'a self,
        bot: &'a BotCredential,
        file_id: &'a str,
    ) -> BoxFuture<'a, String> {
        Box::pin(self.resolve_download_url(bot, file_id))
    }

    fn fetch_document_boxed<'a>(
        &'a self,
        bot: &'a BotCredential,
        file_id: &'a str,
    ) -> BoxFuture<'a, Vec<u8>> {
        Box::pin(self.fetch_document(bot, file_id))
    }
}

/// Type-erased, cheaply cloneable transport.
#[derive(Clone)]
pub struct BoxFileTransport {
    inner: Arc<dyn FileTransportDyn>,
}

impl BoxFileTransport {
    pub fn new<T: FileTransport + 'static>(transport: T) -> Self {
        Self {
            inner: Arc::new(transport),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn send_document(
        &self,
        bot: &BotCredential,
        payload: &[u8],
        filename: &str,
        caption: &str,
    ) -> Result<RemoteFile, TransportError> {
        self.inner
            .send_document_boxed(bot, payload, filename, caption)
            .await
    }

    pub async fn resolve_download_url(
        &self,
        bot: &BotCredential,
        file_id: &str,
    ) -> Result<String, TransportError> {
        self.inner.resolve_download_url_boxed(bot, file_id).await
    }

    pub async fn fetch_document(
        &self,
        bot: &BotCredential,
        file_id: &str,
    ) -> Result<Vec<u8>, TransportError> {
        self.inner.fetch_document_boxed(bot, file_id).await
    }
}

impl std::fmt::Debug for BoxFileTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxFileTransport")
            .field("name", &self.name())
            .finish()
    }
}
