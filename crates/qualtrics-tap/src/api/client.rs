//! HTTP client for the response-export API
//!
//! Every request goes through one transport retry policy: connect errors,
//! timeouts, bodies cut off mid-read, `429` and `5xx` are retried with
//! exponential backoff; any other failure is returned immediately. Callers decide which stage error a final
//! [`RequestError`] becomes.

use crate::api::{endpoints, types::*};
use crate::config::TapConfig;
use crate::error::{RequestError, Result, TapError};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Header carrying the API token
pub const API_TOKEN_HEADER: &str = "x-api-token";

const USER_AGENT: &str = concat!("tap-qualtrics/", env!("CARGO_PKG_VERSION"));

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per request, including the first
    pub max_attempts: u32,
    /// Wait before the second attempt; doubles afterwards
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
        }
    }

    /// Wait after failed attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(2u32.pow(exponent))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

/// Client for one survey's export endpoints
pub struct ExportClient {
    http: Client,
    root: String,
    retry: RetryPolicy,
}

impl ExportClient {
    /// Build a client for `export_path` (the survey's export-responses path)
    pub fn new(config: &TapConfig, export_path: &str) -> Result<Self> {
        let mut token = HeaderValue::from_str(&config.api_token)
            .map_err(|_| TapError::config("api_token contains characters not allowed in a header"))?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_TOKEN_HEADER, token);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| TapError::config(format!("cannot build HTTP client: {}", e)))?;

        let retry = RetryPolicy::new(
            config.max_retries,
            Duration::from_secs(config.retry_backoff_secs),
        );

        Ok(Self {
            http,
            root: endpoints::export_root(&config.base_url(), export_path),
            retry,
        })
    }

    /// The survey's export root URL
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Start an export; returns the progress identifier
    #[instrument(skip(self, request), fields(start_date = %request.start_date))]
    pub async fn start_export(
        &self,
        request: &ExportRequest,
    ) -> std::result::Result<StartExportResult, RequestError> {
        let url = endpoints::start_export_url(&self.root);
        let (http, url) = (&self.http, url.as_str());
        self.with_retry("start export", move || async move {
            read_result(send_once(http.post(url).json(request)).await?).await
        })
        .await
    }

    /// Fetch the current status of an export
    #[instrument(skip(self))]
    pub async fn export_progress(
        &self,
        progress_id: &str,
    ) -> std::result::Result<ExportProgress, RequestError> {
        let url = endpoints::export_progress_url(&self.root, progress_id);
        let (http, url) = (&self.http, url.as_str());
        self.with_retry("export progress", move || async move {
            read_result(send_once(http.get(url)).await?).await
        })
        .await
    }

    /// Open the archive download; the body is left unread for streaming
    #[instrument(skip(self))]
    pub async fn download_export(
        &self,
        file_id: &str,
    ) -> std::result::Result<Response, RequestError> {
        let url = endpoints::export_file_url(&self.root, file_id);
        let (http, url) = (&self.http, url.as_str());
        self.with_retry("download export", move || send_once(http.get(url)))
            .await
    }

    /// Run `attempt` until it succeeds, fails permanently, or attempts run out.
    ///
    /// An attempt covers the whole exchange, body included, so a connection
    /// dropped mid-body is retried like one dropped before the headers.
    async fn with_retry<T, F, Fut>(
        &self,
        operation: &str,
        attempt_once: F,
    ) -> std::result::Result<T, RequestError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<T, RequestError>>,
    {
        let mut attempt = 1;
        loop {
            match attempt_once().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    let wait = self.retry.backoff(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %err,
                        "Request failed, retrying in {:?}",
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                },
                Err(err) => return Err(err),
            }
        }
    }
}

async fn send_once(request: RequestBuilder) -> std::result::Result<Response, RequestError> {
    let response = request.send().await?;
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(RequestError::Status { status, body })
}

async fn read_result<T: DeserializeOwned>(
    response: Response,
) -> std::result::Result<T, RequestError> {
    let bytes = response.bytes().await.map_err(RequestError::Interrupted)?;
    let envelope: ApiEnvelope<T> =
        serde_json::from_slice(&bytes).map_err(|e| RequestError::Body(e.to_string()))?;

    if let Some(request_id) = envelope.meta.as_ref().and_then(|m| m.request_id.as_deref()) {
        debug!(request_id, "Export API response");
    }

    Ok(envelope.result)
}
