//! HTTP client for the Flic/SocialVerse posts API

use super::{RemoteApi, RemoteResult};
use crate::config::{ApiConfig, RetryConfig};
use crate::error::{Error, RemoteError, RemoteOperation, Result};
use crate::retry::call_with_retry;
use crate::types::{NewPost, UploadTarget};
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;

/// Header carrying the static credential
const TOKEN_HEADER: &str = "Flic-Token";

/// Longest response body kept in error messages
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Recorded instead of the error body when it cannot be read within the call's deadline
const UNREADABLE_BODY: &str = "<response body not received before timeout>";

/// Raw `generate-upload-url` response; both fields are required
#[derive(Debug, Deserialize)]
struct UploadUrlResponse {
    url: Option<String>,
    hash: Option<String>,
}

/// [`RemoteApi`] over HTTP
///
/// Every call carries its own timeout. The upload-target request and the upload are wrapped
/// in the configured retry policy; post creation is always a single attempt.
pub struct FlicClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    request_timeout: Duration,
    upload_timeout: Duration,
    retry: RetryConfig,
}

impl FlicClient {
    /// Build a client from the API settings
    ///
    /// # Errors
    /// Returns a configuration error if the base URL does not parse.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        url::Url::parse(&config.base_url)
            .map_err(|e| Error::config("api.base_url", format!("invalid URL: {}", e)))?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("flic-ingest/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            request_timeout: config.request_timeout,
            upload_timeout: config.upload_timeout,
            retry: config.retry.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request with a timeout, mapping non-2xx statuses to errors
    ///
    /// The deadline also bounds reading the body of an error response.
    async fn send(
        &self,
        operation: RemoteOperation,
        method: &'static str,
        target: &str,
        request: reqwest::RequestBuilder,
        timeout: Duration,
    ) -> RemoteResult<reqwest::Response> {
        let deadline = tokio::time::Instant::now() + timeout;
        let response = match tokio::time::timeout_at(deadline, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(source)) => {
                tracing::warn!(%operation, method, target, error = %source, "HTTP request failed");
                return Err(RemoteError::Transport { operation, source });
            }
            Err(_) => {
                tracing::warn!(%operation, method, target, ?timeout, "HTTP request timed out");
                return Err(RemoteError::Timeout { operation, timeout });
            }
        };

        let status = response.status();
        tracing::info!(
            %operation,
            method,
            target,
            status = status.as_u16(),
            "HTTP request completed"
        );

        if !status.is_success() {
            let body = match tokio::time::timeout_at(deadline, response.text()).await {
                Ok(text) => text.unwrap_or_default(),
                Err(_) => {
                    tracing::warn!(%operation, method, target, ?timeout, "error body timed out");
                    UNREADABLE_BODY.to_string()
                }
            };
            return Err(RemoteError::Status {
                operation,
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        Ok(response)
    }

    async fn request_upload_target_once(&self) -> RemoteResult<UploadTarget> {
        let operation = RemoteOperation::RequestUploadTarget;
        let url = self.endpoint("/posts/generate-upload-url");
        let request = self
            .http
            .get(&url)
            .header(TOKEN_HEADER, &self.token)
            .header(CONTENT_TYPE, "application/json");

        let response = self
            .send(operation, "GET", &url, request, self.request_timeout)
            .await?;

        let body = tokio::time::timeout(self.request_timeout, response.bytes())
            .await
            .map_err(|_| RemoteError::Timeout {
                operation,
                timeout: self.request_timeout,
            })?
            .map_err(|source| RemoteError::Transport { operation, source })?;

        parse_upload_target(&body)
    }

    async fn upload_once(&self, target: &UploadTarget, file: &Path) -> RemoteResult<u16> {
        let operation = RemoteOperation::Upload;
        let unreadable = |e: std::io::Error| RemoteError::SourceUnreadable {
            path: file.to_path_buf(),
            reason: e.to_string(),
        };

        let handle = tokio::fs::File::open(file).await.map_err(unreadable)?;
        let len = handle.metadata().await.map_err(unreadable)?.len();
        let body = reqwest::Body::wrap_stream(ReaderStream::new(handle));

        tracing::debug!(path = %file.display(), bytes = len, "streaming upload");

        let request = self
            .http
            .put(&target.url)
            .header(CONTENT_LENGTH, len)
            .body(body);

        let response = self
            .send(operation, "PUT", &target.url, request, self.upload_timeout)
            .await?;
        Ok(response.status().as_u16())
    }
}

#[async_trait]
impl RemoteApi for FlicClient {
    async fn request_upload_target(&self) -> RemoteResult<UploadTarget> {
        call_with_retry(&self.retry, || self.request_upload_target_once()).await
    }

    async fn upload(&self, target: &UploadTarget, file: &Path) -> RemoteResult<u16> {
        call_with_retry(&self.retry, || self.upload_once(target, file)).await
    }

    async fn create_post(&self, post: &NewPost) -> RemoteResult<u16> {
        let url = self.endpoint("/posts");
        let request = self
            .http
            .post(&url)
            .header(TOKEN_HEADER, &self.token)
            .json(post);

        let response = self
            .send(
                RemoteOperation::CreatePost,
                "POST",
                &url,
                request,
                self.request_timeout,
            )
            .await?;
        Ok(response.status().as_u16())
    }

    fn name(&self) -> &str {
        "flic-http"
    }
}

fn parse_upload_target(body: &[u8]) -> RemoteResult<UploadTarget> {
    let operation = RemoteOperation::RequestUploadTarget;
    let parsed: UploadUrlResponse =
        serde_json::from_slice(body).map_err(|e| RemoteError::InvalidResponse {
            operation,
            reason: format!("body is not valid JSON: {}", e),
        })?;

    match (parsed.url, parsed.hash) {
        (Some(url), Some(hash)) if !url.is_empty() && !hash.is_empty() => {
            Ok(UploadTarget { url, hash })
        }
        (url, _) if url.as_deref().is_none_or(str::is_empty) => {
            Err(RemoteError::InvalidResponse {
                operation,
                reason: "missing 'url'".into(),
            })
        }
        _ => Err(RemoteError::InvalidResponse {
            operation,
            reason: "missing 'hash'".into(),
        }),
    }
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        body.to_string()
    } else {
        let head: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}...", head)
    }
}
