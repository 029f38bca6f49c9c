//! Scan session endpoints
//!
//! POST /scan/analyze, POST /scan/sessions, GET|DELETE /scan/sessions/:id,
//! POST /scan/sessions/:id/remove-bg, POST /scan/sessions/claim

use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{json_body, path_id, query_params, read_upload_form, Envelope};
use crate::context::CallerContext;
use crate::db::sessions::{DeleteMode, DeleteSummary};
use crate::error::ApiResult;
use crate::services::report_aggregator::SessionView;
use crate::services::scan_orchestrator::{CreatedSession, RemoveBgOutcome, SessionDraft};
use crate::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// DELETE /scan/sessions/:id query
#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub hard: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub session_id: Uuid,
    pub mode: DeleteMode,
    pub deleted: DeleteSummary,
}

/// POST /scan/sessions/claim body
#[derive(Debug, Default, Deserialize)]
pub struct ClaimRequest {
    #[serde(default)]
    pub session_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub claimed: u64,
}

/// POST /scan/analyze
///
/// 200 for every content outcome (cat or not, any face count). The
/// `X-Request-ID` header is set on every response, errors included.
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let outcome = async {
        let form = read_upload_form(multipart, &state.config.upload_rules).await?;
        state.orchestrator.analyze(form.file).await
    }
    .await;

    match outcome {
        Ok(result) => {
            let request_id = result.request_id.clone();
            with_request_id((StatusCode::OK, Json(result)).into_response(), &request_id)
        }
        Err(err) => {
            let request_id = catscan_common::uuid_utils::generate_random().to_string();
            with_request_id(err.into_response(), &request_id)
        }
    }
}

fn with_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// POST /scan/sessions
pub async fn create_session(
    State(state): State<AppState>,
    ctx: CallerContext,
    payload: Result<Json<SessionDraft>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Envelope<CreatedSession>>)> {
    let draft = json_body(payload)?;
    let created = state.orchestrator.store_session(&ctx, draft).await?;
    Ok((StatusCode::CREATED, Envelope::ok(created)))
}

/// GET /scan/sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Envelope<SessionView>>> {
    let session_id = path_id(path, "SESSION_NOT_FOUND")?;
    let view = state.reports.session_view(session_id).await?;
    Ok(Envelope::ok(view))
}

/// POST /scan/sessions/:id/remove-bg
pub async fn remove_background(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Envelope<RemoveBgOutcome>>> {
    let session_id = path_id(path, "SESSION_NOT_FOUND")?;
    let outcome = state.orchestrator.process_remove_bg(session_id).await?;
    Ok(Envelope::ok(outcome))
}

/// DELETE /scan/sessions/:id[?hard=true]
///
/// Idempotent: deleting an unknown or already deleted session returns zero
/// counts.
pub async fn delete_session(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<DeleteParams>, QueryRejection>,
) -> ApiResult<Json<Envelope<DeleteResponse>>> {
    let params = query_params(query)?;
    let mode = if params.hard { DeleteMode::Hard } else { DeleteMode::Soft };
    let session_id = match path {
        Ok(Path(id)) => id,
        // An id that cannot exist is already gone
        Err(_) => {
            return Ok(Envelope::ok(DeleteResponse {
                session_id: Uuid::nil(),
                mode,
                deleted: DeleteSummary::default(),
            }))
        }
    };

    let deleted = state.orchestrator.delete_session(session_id, mode).await?;
    Ok(Envelope::ok(DeleteResponse {
        session_id,
        mode,
        deleted,
    }))
}

/// POST /scan/sessions/claim
pub async fn claim_sessions(
    State(state): State<AppState>,
    ctx: CallerContext,
    payload: Result<Json<ClaimRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<ClaimResponse>>> {
    let request = json_body(payload)?;
    let claimed = state.orchestrator.claim_sessions(&ctx, request.session_ids).await?;
    Ok(Envelope::ok(ClaimResponse { claimed }))
}

/// Build scan routes
pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route("/scan/analyze", post(analyze))
        .route("/scan/sessions", post(create_session))
        .route("/scan/sessions/claim", post(claim_sessions))
        .route("/scan/sessions/:id", get(get_session).delete(delete_session))
        .route("/scan/sessions/:id/remove-bg", post(remove_background))
}
