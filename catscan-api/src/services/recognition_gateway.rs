//! Recognition service client
//!
//! Two upstream calls:
//! - `POST {base}/recognize` (multipart `file`): 15 s timeout, one retry on
//!   connect errors, timeouts and HTTP 502/503/504
//! - `POST {base}/remove-bg` (JSON `{url}`): 60 s timeout, never retried
//!
//! Raw recognition bodies are returned as JSON values; shaping them into the
//! public payload is the normalizer's job.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::upload_validator::UploadedFile;

pub const DEFAULT_RECOGNIZE_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_REMOVE_BG_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_RECOGNIZE_RETRIES: u32 = 1;

/// Maximum length of an upstream error summary passed back to callers
pub const UPSTREAM_SUMMARY_MAX_CHARS: usize = 200;

const RETRY_DELAY: Duration = Duration::from_millis(250);
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Recognition client errors
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// Transport failure, timeout, or upstream 5xx
    #[error("Recognition service unreachable: {0}")]
    Unreachable(String),

    /// Recognition answered with something that is not a JSON object
    #[error("Invalid recognition response: {0}")]
    InvalidResponse(String),

    #[error("Background removal returned HTTP {status}: {summary}")]
    RemoveBgHttp { status: u16, summary: String },

    /// Upstream answered 2xx with `ok: false`
    #[error("Background removal failed: {summary}")]
    RemoveBgFailed { summary: String },

    /// 2xx without the fields we need, or not JSON at all
    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),
}

/// Raw recognition answer
#[derive(Debug, Clone)]
pub struct RecognitionResponse {
    pub body: Value,
    /// `X-Request-ID` response header, if the upstream sent one
    pub header_request_id: Option<String>,
    /// Wall time across all attempts
    pub latency_ms: u64,
}

/// Artifact produced by background removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveBgArtifact {
    pub id: String,
    pub url: String,
    pub bucket: Option<String>,
    pub filename: Option<String>,
    pub hash: Option<String>,
    pub cached: bool,
}

/// External vision backend
#[async_trait]
pub trait RecognitionGateway: Send + Sync {
    async fn recognize(&self, file: &UploadedFile) -> Result<RecognitionResponse, RecognitionError>;

    async fn remove_background(&self, source_url: &str) -> Result<RemoveBgArtifact, RecognitionError>;
}

/// Connection settings for [`HttpRecognitionGateway`]
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    pub recognize_timeout: Duration,
    pub remove_bg_timeout: Duration,
    pub recognize_retries: u32,
}

impl GatewaySettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            recognize_timeout: DEFAULT_RECOGNIZE_TIMEOUT,
            remove_bg_timeout: DEFAULT_REMOVE_BG_TIMEOUT,
            recognize_retries: DEFAULT_RECOGNIZE_RETRIES,
        }
    }
}

/// reqwest-backed recognition client
pub struct HttpRecognitionGateway {
    http_client: reqwest::Client,
    settings: GatewaySettings,
}

impl HttpRecognitionGateway {
    pub fn new(settings: GatewaySettings) -> Result<Self, RecognitionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("catscan-api/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RecognitionError::Unreachable(e.to_string()))?;

        Ok(Self {
            http_client,
            settings,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    fn recognize_form(file: &UploadedFile) -> Result<reqwest::multipart::Form, RecognitionError> {
        let mut part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone().unwrap_or_else(|| "upload".to_string()));
        if let Some(content_type) = &file.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| RecognitionError::Unreachable(format!("invalid content type: {}", e)))?;
        }
        Ok(reqwest::multipart::Form::new().part("file", part))
    }

    /// One recognize attempt; `Err((error, retryable))`
    async fn recognize_once(
        &self,
        file: &UploadedFile,
    ) -> Result<(Value, Option<String>), (RecognitionError, bool)> {
        let form = Self::recognize_form(file).map_err(|e| (e, false))?;

        let response = self
            .http_client
            .post(self.endpoint("recognize"))
            .multipart(form)
            .timeout(self.settings.recognize_timeout)
            .send()
            .await
            .map_err(|e| {
                let retryable = e.is_connect() || e.is_timeout();
                (RecognitionError::Unreachable(e.to_string()), retryable)
            })?;

        let status = response.status();
        if status.is_server_error() {
            let retryable = matches!(status.as_u16(), 502 | 503 | 504);
            return Err((
                RecognitionError::Unreachable(format!("upstream returned HTTP {}", status.as_u16())),
                retryable,
            ));
        }

        let header_request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);

        let text = response.text().await.map_err(|e| {
            let retryable = e.is_timeout();
            (RecognitionError::Unreachable(e.to_string()), retryable)
        })?;

        if !status.is_success() {
            return Err((
                RecognitionError::InvalidResponse(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    summarize_upstream_body(&text)
                )),
                false,
            ));
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| (RecognitionError::InvalidResponse(format!("body is not JSON: {}", e)), false))?;
        if !body.is_object() {
            return Err((
                RecognitionError::InvalidResponse("body is not a JSON object".to_string()),
                false,
            ));
        }

        Ok((body, header_request_id))
    }
}

#[async_trait]
impl RecognitionGateway for HttpRecognitionGateway {
    async fn recognize(&self, file: &UploadedFile) -> Result<RecognitionResponse, RecognitionError> {
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            match self.recognize_once(file).await {
                Ok((body, header_request_id)) => {
                    let latency_ms = started.elapsed().as_millis() as u64;
                    tracing::debug!(attempt, latency_ms, "Recognition call succeeded");
                    return Ok(RecognitionResponse {
                        body,
                        header_request_id,
                        latency_ms,
                    });
                }
                Err((error, true)) if attempt < self.settings.recognize_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %error, "Transient recognition failure, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err((error, _)) => return Err(error),
            }
        }
    }

    async fn remove_background(&self, source_url: &str) -> Result<RemoveBgArtifact, RecognitionError> {
        let response = self
            .http_client
            .post(self.endpoint("remove-bg"))
            .json(&serde_json::json!({ "url": source_url }))
            .timeout(self.settings.remove_bg_timeout)
            .send()
            .await
            .map_err(|e| RecognitionError::Unreachable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RecognitionError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            return Err(RecognitionError::RemoveBgHttp {
                status: status.as_u16(),
                summary: summarize_upstream_body(&text),
            });
        }

        parse_remove_bg_body(&text)
    }
}

#[derive(Debug, Deserialize)]
struct RemoveBgBody {
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    bucket: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    cached: Option<bool>,
}

/// Interpret a 2xx remove-bg body
pub fn parse_remove_bg_body(text: &str) -> Result<RemoveBgArtifact, RecognitionError> {
    let body: RemoveBgBody = serde_json::from_str(text)
        .map_err(|e| RecognitionError::MalformedResponse(format!("body is not valid JSON: {}", e)))?;

    if body.ok == Some(false) {
        return Err(RecognitionError::RemoveBgFailed {
            summary: summarize_upstream_body(text),
        });
    }

    let id = body.id.filter(|s| !s.trim().is_empty());
    let url = body.url.filter(|s| !s.trim().is_empty());
    match (id, url) {
        (Some(id), Some(url)) => Ok(RemoveBgArtifact {
            id,
            url,
            bucket: body.bucket,
            filename: body.filename,
            hash: body.hash,
            cached: body.cached.unwrap_or(false),
        }),
        _ => Err(RecognitionError::MalformedResponse(
            "response is missing id or url".to_string(),
        )),
    }
}

/// Short, single-line description of an upstream error body
///
/// Prefers the `error`/`message`/`detail` string of a JSON body, otherwise
/// the raw text. Whitespace is collapsed and the result is capped at
/// [`UPSTREAM_SUMMARY_MAX_CHARS`].
pub fn summarize_upstream_body(text: &str) -> String {
    let picked = serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| {
            ["error", "message", "detail"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(String::from))
        })
        .unwrap_or_else(|| text.to_string());

    let collapsed = picked.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return "empty response body".to_string();
    }
    if collapsed.chars().count() <= UPSTREAM_SUMMARY_MAX_CHARS {
        return collapsed;
    }

    let mut truncated: String = collapsed.chars().take(UPSTREAM_SUMMARY_MAX_CHARS - 3).collect();
    truncated.push_str("...");
    truncated
}
