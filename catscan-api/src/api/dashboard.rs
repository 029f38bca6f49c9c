//! Report read endpoints
//!
//! GET /reports/dashboard, GET /reports/sessions/:id/pdf-data

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{path_id, query_params, Envelope};
use crate::context::{parse_session_ids, CallerContext};
use crate::error::ApiResult;
use crate::services::report_aggregator::{DashboardSummary, PdfData};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    /// Comma-separated ids, used by guests
    pub session_ids: Option<String>,
}

/// GET /reports/dashboard[?session_ids=a,b]
pub async fn dashboard(
    State(state): State<AppState>,
    ctx: CallerContext,
    query: Result<Query<DashboardParams>, QueryRejection>,
) -> ApiResult<Json<Envelope<DashboardSummary>>> {
    let params = query_params(query)?;
    let ids = parse_session_ids(params.session_ids.as_deref())?;
    let summary = state.reports.dashboard(&ctx.read_scope(ids)).await?;
    Ok(Envelope::ok(summary))
}

/// GET /reports/sessions/:id/pdf-data
pub async fn pdf_data(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Envelope<PdfData>>> {
    let session_id = path_id(path, "SESSION_NOT_FOUND")?;
    let data = state.reports.pdf_data(session_id).await?;
    Ok(Envelope::ok(data))
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/reports/dashboard", get(dashboard))
        .route("/reports/sessions/:id/pdf-data", get(pdf_data))
}
