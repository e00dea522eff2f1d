//! In-memory transport for pool and manager tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use teledrive_types::bot::BotCredential;
use teledrive_types::error::TransportError;

use super::{FileTransport, RemoteFile};

#[derive(Default)]
struct MockState {
    documents: Mutex<HashMap<String, Vec<u8>>>,
    failing_bots: Mutex<HashMap<String, TransportError>>,
    scripted: Mutex<VecDeque<TransportError>>,
    /// Per-send stalls, consumed in order; `None` never completes.
    send_stalls: Mutex<VecDeque<Option<Duration>>>,
    next_id: AtomicUsize,
    send_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    url_calls: AtomicUsize,
    senders: Mutex<Vec<String>>,
}

/// Stores documents in memory. Clones share state.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call made with `bot_id` fails with `error`.
    pub fn failing_bot(self, bot_id: &str, error: TransportError) -> Self {
        self.state
            .failing_bots
            .lock()
            .unwrap()
            .insert(bot_id.to_string(), error);
        self
    }

    /// The next call (of any kind) fails with `error`; queued errors are
    /// consumed in order.
    pub fn fail_next(&self, error: TransportError) {
        self.state.scripted.lock().unwrap().push_back(error);
    }

    /// The next `send_document` sleeps for `delay` before answering.
    pub fn delay_next_send(&self, delay: Duration) {
        self.state.send_stalls.lock().unwrap().push_back(Some(delay));
    }

    /// The next `send_document` never answers.
    pub fn hang_next_send(&self) {
        self.state.send_stalls.lock().unwrap().push_back(None);
    }

    /// Overwrite a stored document, e.g. to simulate corruption.
    pub fn replace_document(&self, file_id: &str, bytes: Vec<u8>) {
        self.state
            .documents
            .lock()
            .unwrap()
            .insert(file_id.to_string(), bytes);
    }

    pub fn send_calls(&self) -> usize {
        self.state.send_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn url_calls(&self) -> usize {
        self.state.url_calls.load(Ordering::SeqCst)
    }

    /// Bot ids in the order `send_document` was called.
    pub fn senders(&self) -> Vec<String> {
        self.state.senders.lock().unwrap().clone()
    }

    pub fn stored_documents(&self) -> usize {
        self.state.documents.lock().unwrap().len()
    }

    fn injected_failure(&self, bot: &BotCredential) -> Option<TransportError> {
        if let Some(err) = self.state.failing_bots.lock().unwrap().get(&bot.id) {
            return Some(err.clone());
        }
        self.state.scripted.lock().unwrap().pop_front()
    }

    fn lookup(&self, bot: &BotCredential, file_id: &str) -> Result<Vec<u8>, TransportError> {
        if !file_id.starts_with(&format!("{}-", bot.id)) {
            return Err(TransportError::InvalidRequest(format!(
                "file {file_id} was not stored by {}",
                bot.id
            )));
        }
        self.state
            .documents
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| TransportError::InvalidRequest(format!("file {file_id} not found")))
    }
}

impl FileTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send_document(
        &self,
        bot: &BotCredential,
        payload: &[u8],
        _filename: &str,
        _caption: &str,
    ) -> Result<RemoteFile, TransportError> {
        self.state.send_calls.fetch_add(1, Ordering::SeqCst);
        self.state.senders.lock().unwrap().push(bot.id.clone());
        let stall = self.state.send_stalls.lock().unwrap().pop_front();
        match stall {
            Some(Some(delay)) => tokio::time::sleep(delay).await,
            Some(None) => std::future::pending::<()>().await,
            None => {}
        }
        if let Some(err) = self.injected_failure(bot) {
            return Err(err);
        }
        let n = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        let file_id = format!("{}-doc-{n}", bot.id);
        self.state
            .documents
            .lock()
            .unwrap()
            .insert(file_id.clone(), payload.to_vec());
        Ok(RemoteFile {
            file_id,
            size: Some(payload.len() as u64),
        })
    }

    async fn resolve_download_url(
        &self,
        bot: &BotCredential,
        file_id: &str,
    ) -> Result<String, TransportError> {
        self.state.url_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.injected_failure(bot) {
            return Err(err);
        }
        self.lookup(bot, file_id)?;
        Ok(format!("mock://{}/{file_id}", bot.id))
    }

    async fn fetch_document(
        &self,
        bot: &BotCredential,
        file_id: &str,
    ) -> Result<Vec<u8>, TransportError> {
        self.state.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.injected_failure(bot) {
            return Err(err);
        }
        self.lookup(bot, file_id)
    }
}
