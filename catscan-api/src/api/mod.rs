//! HTTP API handlers for catscan-api
//!
//! Successful responses use `{ ok: true, data }`; errors go through
//! [`ApiError`](crate::error::ApiError).

pub mod artifacts;
pub mod cats;
pub mod checkup_reports;
pub mod dashboard;
pub mod health;
pub mod hooks;
pub mod scan;

pub use artifacts::artifact_routes;
pub use cats::cat_routes;
pub use checkup_reports::checkup_report_routes;
pub use dashboard::dashboard_routes;
pub use health::health_routes;
pub use hooks::hook_routes;
pub use scan::scan_routes;

use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::services::upload_validator::{screen_mime, UploadRejection, UploadRules, UploadedFile, SNIFF_LEN};

/// Success envelope
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub ok: bool,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self { ok: true, data })
    }
}

/// Unwrap a JSON body, turning extractor rejections into validation errors
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

pub fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

/// Path id; an unparseable id cannot name an existing resource
pub fn path_id(
    path: Result<Path<Uuid>, PathRejection>,
    not_found_code: &'static str,
) -> ApiResult<Uuid> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::not_found(not_found_code, "Resource not found"))
}

/// Parts of a multipart upload form
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

/// Drain a multipart form: the `file` part as bytes, other parts as text
///
/// The `file` part is screened for a disallowed type as soon as its first
/// bytes arrive, so an oversized file of the wrong type still reports the
/// type rather than tripping the body limit.
pub async fn read_upload_form(
    multipart: Result<Multipart, MultipartRejection>,
    rules: &UploadRules,
) -> ApiResult<UploadForm> {
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Request is not a multipart form");
        ApiError::Upload(UploadRejection::InvalidFile)
    })?;

    let mut form = UploadForm::default();
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, rules))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().map(String::from);
            let content_type = field.content_type().map(String::from);

            let mut bytes = Vec::new();
            let mut screened = false;
            loop {
                let chunk = match field.chunk().await {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => break,
                    Err(err) => {
                        if !screened {
                            screen_mime(&bytes, content_type.as_deref(), rules)?;
                        }
                        return Err(multipart_error(err, rules));
                    }
                };
                bytes.extend_from_slice(&chunk);
                if !screened && bytes.len() >= SNIFF_LEN {
                    screen_mime(&bytes, content_type.as_deref(), rules)?;
                    screened = true;
                }
            }

            form.file = Some(UploadedFile {
                file_name,
                content_type,
                bytes,
            });
        } else {
            let value = field.text().await.map_err(|e| multipart_error(e, rules))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

fn multipart_error(err: MultipartError, rules: &UploadRules) -> ApiError {
    tracing::debug!(error = %err, "Multipart body could not be read");
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::Upload(rules.too_large())
    } else {
        ApiError::Upload(UploadRejection::InvalidFile)
    }
}
