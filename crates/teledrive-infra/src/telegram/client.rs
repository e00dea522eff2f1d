//! TelegramBotApi -- concrete [`FileTransport`] over the Telegram Bot API.
//!
//! Bot tokens are only exposed while building request URLs. Transport errors
//! are stripped of their URL before being surfaced, since Bot API URLs embed
//! the token.

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::debug;

use teledrive_core::transport::{FileTransport, RemoteFile};
use teledrive_types::bot::BotCredential;
use teledrive_types::config::TELEGRAM_MAX_UPLOAD_BYTES;
use teledrive_types::error::TransportError;

use super::types::{ApiResponse, TgFile, TgMessage};

/// Telegram Bot API client shared by every credential of a pool.
pub struct TelegramBotApi {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramBotApi {
    /// Create a client against `base_url` (normally
    /// [`TELEGRAM_API_BASE_URL`](teledrive_types::config::TELEGRAM_API_BASE_URL)).
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("teledrive/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn method_url(&self, bot: &BotCredential, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, bot.token.expose_secret())
    }

    fn file_url(&self, bot: &BotCredential, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{file_path}",
            self.base_url,
            bot.token.expose_secret()
        )
    }

    async fn get_file(&self, bot: &BotCredential, file_id: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .get(self.method_url(bot, "getFile"))
            .query(&[("file_id", file_id)])
            .send()
            .await
            .map_err(network_error)?;
        let file: TgFile = parse_response(response).await?;
        file.file_path.ok_or_else(|| {
            TransportError::Deserialization(format!("getFile returned no file_path for {file_id}"))
        })
    }
}

impl FileTransport for TelegramBotApi {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_document(
        &self,
        bot: &BotCredential,
        payload: &[u8],
        filename: &str,
        caption: &str,
    ) -> Result<RemoteFile, TransportError> {
        let size = payload.len() as u64;
        if size == 0 {
            return Err(TransportError::EmptyPayload);
        }
        if size > TELEGRAM_MAX_UPLOAD_BYTES {
            return Err(TransportError::PayloadTooLarge {
                size,
                limit: TELEGRAM_MAX_UPLOAD_BYTES,
            });
        }

        let document = Part::bytes(payload.to_vec())
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let form = Form::new()
            .text("chat_id", bot.chat_id.clone())
            .text("caption", caption.to_string())
            .text("disable_content_type_detection", "true")
            .text("disable_notification", "true")
            .part("document", document);

        let response = self
            .client
            .post(self.method_url(bot, "sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(network_error)?;
        let message: TgMessage = parse_response(response).await?;

        let document = message.document.ok_or_else(|| {
            TransportError::Deserialization(format!(
                "message {} carries no document",
                message.message_id
            ))
        })?;
        debug!(bot = %bot.id, file_id = %document.file_id, bytes = size, "Document stored");
        Ok(RemoteFile {
            file_id: document.file_id,
            size: document.file_size,
        })
    }

    async fn resolve_download_url(
        &self,
        bot: &BotCredential,
        file_id: &str,
    ) -> Result<String, TransportError> {
        let file_path = self.get_file(bot, file_id).await?;
        Ok(self.file_url(bot, &file_path))
    }

    async fn fetch_document(
        &self,
        bot: &BotCredential,
        file_id: &str,
    ) -> Result<Vec<u8>, TransportError> {
        let file_path = self.get_file(bot, file_id).await?;
        let response = self
            .client
            .get(self.file_url(bot, &file_path))
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_header(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(classify(status.as_u16(), body, retry_after));
        }
        let bytes = response.bytes().await.map_err(network_error)?;
        Ok(bytes.to_vec())
    }
}

fn network_error(err: reqwest::Error) -> TransportError {
    let err = err.without_url();
    if err.is_timeout() {
        TransportError::Network(format!("request timed out: {err}"))
    } else {
        TransportError::Network(err.to_string())
    }
}

fn retry_after_header(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Map a Bot API error code onto the transport error taxonomy.
fn classify(code: u16, description: String, retry_after: Option<u64>) -> TransportError {
    match code {
        429 => TransportError::RateLimited {
            retry_after_secs: retry_after,
        },
        401 | 403 => TransportError::Unauthorized(description),
        400 if description.contains("file must be non-empty") => TransportError::EmptyPayload,
        400..=499 => TransportError::InvalidRequest(format!("HTTP {code}: {description}")),
        _ => TransportError::Server {
            status: code,
            message: description,
        },
    }
}

async fn parse_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, TransportError> {
    let status = response.status();
    let header_retry = retry_after_header(&response);
    let body = response.text().await.map_err(network_error)?;

    match serde_json::from_str::<ApiResponse<T>>(&body) {
        Ok(api) if api.ok && status.is_success() => api
            .result
            .ok_or_else(|| TransportError::Deserialization("response has no result".to_string())),
        Ok(api) => {
            let code = api.error_code.unwrap_or_else(|| status.as_u16());
            let retry_after = api.parameters.and_then(|p| p.retry_after).or(header_retry);
            let description = api
                .description
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
            Err(classify(code, description, retry_after))
        }
        Err(e) if status.is_success() => Err(TransportError::Deserialization(format!(
            "failed to parse response: {e}"
        ))),
        Err(_) => Err(classify(status.as_u16(), body, header_retry)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teledrive_core::chunked::{ChunkedClient, TransferSettings};
    use teledrive_core::retry::RetryPolicy;
    use teledrive_core::transport::BoxFileTransport;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "123456:TEST-token";

    fn bot() -> BotCredential {
        BotCredential::new("bot1", "Primary", TOKEN, "-100200")
    }

    fn api(server: &MockServer) -> TelegramBotApi {
        TelegramBotApi::new(server.uri()).unwrap()
    }

    fn document_response(file_id: &str, size: u64) -> serde_json::Value {
        serde_json::json!({
            "ok": true,
            "result": {
                "message_id": 7,
                "document": {"file_id": file_id, "file_unique_id": "u", "file_size": size}
            }
        })
    }

    #[tokio::test]
    async fn test_send_document_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/sendDocument")))
            .and(body_string_contains("-100200"))
            .and(body_string_contains("upload-1:0:1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(document_response("doc-1", 5)))
            .expect(1)
            .mount(&server)
            .await;

        let remote = api(&server)
            .send_document(&bot(), b"hello", "hello.txt", "upload-1:0:1")
            .await
            .unwrap();
        assert_eq!(remote.file_id, "doc-1");
        assert_eq!(remote.size, Some(5));
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/sendDocument")))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 429,
                "description": "Too Many Requests: retry after 7",
                "parameters": {"retry_after": 7}
            })))
            .mount(&server)
            .await;

        let err = api(&server)
            .send_document(&bot(), b"x", "x.bin", "c")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::RateLimited {
                retry_after_secs: Some(7)
            }
        ));
    }

    #[tokio::test]
    async fn test_forbidden_is_credential_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot is not a member of the channel chat"
            })))
            .mount(&server)
            .await;

        let err = api(&server)
            .send_document(&bot(), b"x", "x.bin", "c")
            .await
            .unwrap_err();
        assert!(err.is_credential_failure());
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_server_error_without_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
            .mount(&server)
            .await;

        let err = api(&server)
            .send_document(&bot(), b"x", "x.bin", "c")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Server { status: 502, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_oversized_payload_rejected_locally() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let payload = vec![0u8; TELEGRAM_MAX_UPLOAD_BYTES as usize + 1];
        let err = api(&server)
            .send_document(&bot(), &payload, "big.bin", "c")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::PayloadTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_empty_payload_rejected_locally() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(document_response("doc", 0)))
            .expect(0)
            .mount(&server)
            .await;

        let err = api(&server)
            .send_document(&bot(), b"", "empty.txt", "c")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::EmptyPayload));
    }

    #[tokio::test]
    async fn test_empty_file_rejection_is_payload_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: file must be non-empty"
            })))
            .mount(&server)
            .await;

        let err = api(&server)
            .send_document(&bot(), b"x", "x.bin", "c")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::EmptyPayload));
        assert!(err.is_payload_error());
    }

    #[tokio::test]
    async fn test_resolve_download_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/bot{TOKEN}/getFile")))
            .and(query_param("file_id", "doc-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {"file_id": "doc-1", "file_size": 5, "file_path": "documents/file_1.txt"}
            })))
            .mount(&server)
            .await;

        let url = api(&server)
            .resolve_download_url(&bot(), "doc-1")
            .await
            .unwrap();
        assert_eq!(
            url,
            format!("{}/file/bot{TOKEN}/documents/file_1.txt", server.uri())
        );
    }

    #[tokio::test]
    async fn test_fetch_document_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/bot{TOKEN}/getFile")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {"file_id": "doc-1", "file_path": "documents/file_1.bin"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/file/bot{TOKEN}/documents/file_1.bin")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let bytes = api(&server).fetch_document(&bot(), "doc-1").await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_get_file_too_big() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: file is too big"
            })))
            .mount(&server)
            .await;

        let err = api(&server)
            .fetch_document(&bot(), "doc-1")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_chunked_client_retries_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(document_response("doc-9", 3)))
            .mount(&server)
            .await;

        let client = ChunkedClient::new(
            BoxFileTransport::new(api(&server)),
            RetryPolicy::immediate(3),
            TransferSettings::default(),
        );
        let result = client
            .upload(b"abc", "abc.txt", &bot(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.file_id, "doc-9");
        assert_eq!(result.chunks[0].provider_id, "bot1");
    }

    #[test]
    fn test_error_messages_do_not_leak_token() {
        let err = classify(403, "Forbidden".to_string(), None);
        assert!(!err.to_string().contains(TOKEN));
    }
}
