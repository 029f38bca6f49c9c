//! Artifact store client
//!
//! Uploads go to `POST {base}/files` as multipart with the `bucket` field
//! sent before `file`; bulk deletes go to `DELETE {base}/files/selected`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::recognition_gateway::summarize_upstream_body;
use super::upload_validator::UploadedFile;

pub const DEFAULT_ARTIFACT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_BUCKET: &str = "scans";

/// Artifact store errors
#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    #[error("Artifact store unreachable: {0}")]
    Unreachable(String),

    #[error("Artifact store returned HTTP {status}: {summary}")]
    Http { status: u16, summary: String },

    #[error("Malformed artifact store response: {0}")]
    MalformedResponse(String),
}

/// Stored file metadata as reported by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredArtifact {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub mime: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Result of a bulk delete
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscardOutcome {
    pub requested: usize,
    /// Store-reported body, passed through when JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<serde_json::Value>,
}

/// Remote binary storage
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn upload(&self, bucket: &str, file: &UploadedFile) -> Result<StoredArtifact, ArtifactStoreError>;

    async fn delete_selected(&self, ids: &[String]) -> Result<DiscardOutcome, ArtifactStoreError>;
}

#[derive(Debug, Deserialize)]
struct UploadEnvelope {
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    data: Option<StoredArtifact>,
}

/// reqwest-backed artifact store client
pub struct HttpArtifactStore {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpArtifactStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ArtifactStoreError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("catscan-api/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ArtifactStoreError::Unreachable(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            timeout,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn upload(&self, bucket: &str, file: &UploadedFile) -> Result<StoredArtifact, ArtifactStoreError> {
        let mut part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone().unwrap_or_else(|| "upload".to_string()));
        if let Some(content_type) = &file.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| ArtifactStoreError::Unreachable(format!("invalid content type: {}", e)))?;
        }
        // Field order matters to the store: bucket first
        let form = reqwest::multipart::Form::new()
            .text("bucket", bucket.to_string())
            .part("file", part);

        tracing::debug!(bucket, bytes = file.bytes.len(), timeout = ?self.timeout, "Uploading artifact");

        let response = self
            .http_client
            .post(self.endpoint("files"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ArtifactStoreError::Unreachable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ArtifactStoreError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            return Err(ArtifactStoreError::Http {
                status: status.as_u16(),
                summary: summarize_upstream_body(&text),
            });
        }

        parse_upload_body(&text)
    }

    async fn delete_selected(&self, ids: &[String]) -> Result<DiscardOutcome, ArtifactStoreError> {
        if ids.is_empty() {
            return Ok(DiscardOutcome::default());
        }

        let response = self
            .http_client
            .delete(self.endpoint("files/selected"))
            .json(&serde_json::json!({ "ids": ids }))
            .send()
            .await
            .map_err(|e| ArtifactStoreError::Unreachable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ArtifactStoreError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            return Err(ArtifactStoreError::Http {
                status: status.as_u16(),
                summary: summarize_upstream_body(&text),
            });
        }

        Ok(DiscardOutcome {
            requested: ids.len(),
            upstream: serde_json::from_str(&text).ok(),
        })
    }
}

/// Interpret a 2xx upload body
pub fn parse_upload_body(text: &str) -> Result<StoredArtifact, ArtifactStoreError> {
    let envelope: UploadEnvelope = serde_json::from_str(text)
        .map_err(|e| ArtifactStoreError::MalformedResponse(format!("body is not valid JSON: {}", e)))?;

    if envelope.ok == Some(false) {
        return Err(ArtifactStoreError::MalformedResponse(format!(
            "store reported failure: {}",
            summarize_upstream_body(text)
        )));
    }

    match envelope.data {
        Some(data) if !data.id.trim().is_empty() && !data.url.trim().is_empty() => Ok(data),
        _ => Err(ArtifactStoreError::MalformedResponse(
            "response is missing data.id or data.url".to_string(),
        )),
    }
}
