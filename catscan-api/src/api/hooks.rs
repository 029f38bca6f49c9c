//! Hooks for the downstream analysis worker
//!
//! POST /scan/sessions/:id/status, POST /scan/sessions/:id/result

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{json_body, path_id, Envelope};
use crate::error::ApiResult;
use crate::services::scan_orchestrator::{RecordedResult, ResultDraft, StatusUpdate};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub status: String,
}

/// POST /scan/sessions/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<StatusUpdate>>> {
    let session_id = path_id(path, "SESSION_NOT_FOUND")?;
    let request = json_body(payload)?;
    let update = state.orchestrator.update_status(session_id, &request.status).await?;
    Ok(Envelope::ok(update))
}

/// POST /scan/sessions/:id/result
pub async fn record_result(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ResultDraft>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Envelope<RecordedResult>>)> {
    let session_id = path_id(path, "SESSION_NOT_FOUND")?;
    let draft = json_body(payload)?;
    let recorded = state.orchestrator.record_result(session_id, draft).await?;
    Ok((StatusCode::CREATED, Envelope::ok(recorded)))
}

/// Build worker hook routes
pub fn hook_routes() -> Router<AppState> {
    Router::new()
        .route("/scan/sessions/:id/status", post(update_status))
        .route("/scan/sessions/:id/result", post(record_result))
}
