//! Error types for catscan-api
//!
//! Every error response has the shape `{ ok: false, code, message }`, plus
//! optional structured fields for upstream failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::services::artifact_store::ArtifactStoreError;
use crate::services::recognition_gateway::RecognitionError;
use crate::services::upload_validator::UploadRejection;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Upload refused by the validator (400/413/415)
    #[error("Upload rejected: {}", .0.code())]
    Upload(UploadRejection),

    /// Malformed or out-of-range request field (400 VALIDATION_ERROR)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Request is well formed but refers to something unusable (400)
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },

    /// Resource not found (404)
    #[error("{code}: {message}")]
    NotFound { code: &'static str, message: String },

    /// State conflict (409)
    #[error("{code}: {message}")]
    Conflict { code: &'static str, message: String },

    /// Upstream service failed or broke its contract (502)
    #[error("{code}: {message}")]
    Upstream {
        code: &'static str,
        message: String,
        extras: Map<String, Value>,
    },

    /// Persistence failure with a caller-visible code (500)
    #[error("{code}: {message} ({detail})")]
    Persistence {
        code: &'static str,
        message: String,
        detail: &'static str,
    },

    /// Storage or decoding failure without a dedicated code (500)
    #[error("Common error: {0}")]
    Common(#[from] catscan_common::Error),
}

impl ApiError {
    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Conflict {
            code,
            message: message.into(),
        }
    }

    /// Wrap a storage error under a caller-visible code
    ///
    /// The response only names the failure category, never the raw error.
    pub fn persistence(code: &'static str, message: impl Into<String>, err: &catscan_common::Error) -> Self {
        ApiError::Persistence {
            code,
            message: message.into(),
            detail: err.category(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Upload(rejection) => {
                StatusCode::from_u16(rejection.status()).unwrap_or(StatusCode::BAD_REQUEST)
            }
            ApiError::Validation(_) | ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Persistence { .. } | ApiError::Common(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Upload(rejection) => rejection.code(),
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::BadRequest { code, .. }
            | ApiError::NotFound { code, .. }
            | ApiError::Conflict { code, .. }
            | ApiError::Upstream { code, .. }
            | ApiError::Persistence { code, .. } => code,
            ApiError::Common(_) => "INTERNAL_ERROR",
        }
    }

    /// JSON error body
    pub fn body(&self) -> Value {
        let message = match self {
            ApiError::Upload(rejection) => rejection.message(),
            ApiError::Validation(msg) => msg.clone(),
            ApiError::BadRequest { message, .. }
            | ApiError::NotFound { message, .. }
            | ApiError::Conflict { message, .. }
            | ApiError::Upstream { message, .. }
            | ApiError::Persistence { message, .. } => message.clone(),
            ApiError::Common(_) => "Internal server error".to_string(),
        };

        let mut body = json!({
            "ok": false,
            "code": self.code(),
            "message": message,
        });

        if let Some(obj) = body.as_object_mut() {
            match self {
                ApiError::Upstream { extras, .. } => {
                    for (key, value) in extras {
                        obj.insert(key.clone(), value.clone());
                    }
                }
                ApiError::Persistence { detail, .. } => {
                    obj.insert("error".to_string(), json!(detail));
                }
                _ => {}
            }
        }

        body
    }
}

impl From<UploadRejection> for ApiError {
    fn from(rejection: UploadRejection) -> Self {
        ApiError::Upload(rejection)
    }
}

impl From<RecognitionError> for ApiError {
    fn from(err: RecognitionError) -> Self {
        let mut extras = Map::new();
        let (code, message) = match err {
            RecognitionError::Unreachable(_) => (
                "FLASK_UNREACHABLE",
                "Recognition service is unavailable. Please try again.".to_string(),
            ),
            RecognitionError::InvalidResponse(_) => (
                "INVALID_FLASK_RESPONSE",
                "Recognition service returned an invalid response.".to_string(),
            ),
            RecognitionError::RemoveBgHttp { status, summary } => {
                extras.insert("upstream_status".to_string(), json!(status));
                extras.insert("upstream_error".to_string(), json!(summary));
                (
                    "REMOVE_BG_HTTP_ERROR",
                    format!("Background removal failed with HTTP {}.", status),
                )
            }
            RecognitionError::RemoveBgFailed { summary } => {
                extras.insert("upstream_error".to_string(), json!(summary));
                ("REMOVE_BG_FAILED", "Background removal failed.".to_string())
            }
            RecognitionError::MalformedResponse(_) => (
                "MALFORMED_UPSTREAM_RESPONSE",
                "Upstream response is missing required fields.".to_string(),
            ),
        };
        ApiError::Upstream {
            code,
            message,
            extras,
        }
    }
}

impl From<ArtifactStoreError> for ApiError {
    fn from(err: ArtifactStoreError) -> Self {
        let mut extras = Map::new();
        let (code, message) = match err {
            ArtifactStoreError::Unreachable(_) => (
                "ARTIFACT_STORE_UNREACHABLE",
                "Artifact store is unavailable. Please try again.".to_string(),
            ),
            ArtifactStoreError::Http { status, summary } => {
                extras.insert("upstream_status".to_string(), json!(status));
                extras.insert("upstream_error".to_string(), json!(summary));
                (
                    "ARTIFACT_STORE_HTTP_ERROR",
                    format!("Artifact store failed with HTTP {}.", status),
                )
            }
            ArtifactStoreError::MalformedResponse(_) => (
                "MALFORMED_UPSTREAM_RESPONSE",
                "Artifact store response is missing required fields.".to_string(),
            ),
        };
        ApiError::Upstream {
            code,
            message,
            extras,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && !matches!(self, ApiError::Upstream { .. }) {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }
        (status, Json(self.body())).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
