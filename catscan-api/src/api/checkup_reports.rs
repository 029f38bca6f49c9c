//! Checkup report endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::post,
    Json, Router,
};
use uuid::Uuid;

use super::{json_body, path_id, Envelope};
use crate::context::CallerContext;
use crate::error::ApiResult;
use crate::models::CheckupReport;
use crate::services::scan_orchestrator::ReportDraft;
use crate::AppState;

/// POST /scan/sessions/:id/reports
pub async fn submit_report(
    State(state): State<AppState>,
    ctx: CallerContext,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ReportDraft>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Envelope<CheckupReport>>)> {
    let session_id = path_id(path, "SESSION_NOT_FOUND")?;
    let draft = json_body(payload)?;
    let report = state.orchestrator.submit_report(&ctx, session_id, draft).await?;
    Ok((StatusCode::CREATED, Envelope::ok(report)))
}

/// GET /scan/sessions/:id/reports
pub async fn list_reports(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Envelope<Vec<CheckupReport>>>> {
    let session_id = path_id(path, "SESSION_NOT_FOUND")?;
    let reports = state.orchestrator.list_reports(session_id).await?;
    Ok(Envelope::ok(reports))
}

pub fn checkup_report_routes() -> Router<AppState> {
    Router::new().route(
        "/scan/sessions/:id/reports",
        post(submit_report).get(list_reports),
    )
}
