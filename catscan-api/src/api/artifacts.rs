//! Artifact proxy endpoints
//!
//! Clients upload the artifacts they choose to keep through this service so
//! the same upload rules apply, and discard the ones they abandon.

use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        rejection::JsonRejection,
        State,
    },
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use super::{json_body, read_upload_form, Envelope};
use crate::error::ApiResult;
use crate::services::artifact_store::{DiscardOutcome, StoredArtifact};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DiscardRequest {
    #[serde(default)]
    pub ids: Vec<String>,
}

/// POST /scan/artifacts (multipart `file`, optional `bucket`)
pub async fn upload_artifact(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<Envelope<StoredArtifact>>)> {
    let mut form = read_upload_form(multipart, &state.config.upload_rules).await?;
    let bucket = form.fields.remove("bucket");
    let stored = state.orchestrator.upload_artifact(bucket, form.file).await?;
    Ok((StatusCode::CREATED, Envelope::ok(stored)))
}

/// POST /scan/artifacts/discard
pub async fn discard_artifacts(
    State(state): State<AppState>,
    payload: Result<Json<DiscardRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<DiscardOutcome>>> {
    let request = json_body(payload)?;
    let outcome = state.orchestrator.discard_artifacts(request.ids).await?;
    Ok(Envelope::ok(outcome))
}

pub fn artifact_routes() -> Router<AppState> {
    Router::new()
        .route("/scan/artifacts", post(upload_artifact))
        .route("/scan/artifacts/discard", post(discard_artifacts))
}
