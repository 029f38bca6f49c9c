//! Cat registry and per-cat history

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{json_body, path_id, query_params, Envelope};
use crate::context::CallerContext;
use crate::error::ApiResult;
use crate::models::Cat;
use crate::services::report_aggregator::CatHistory;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateCatRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub days: Option<u32>,
}

/// POST /cats
pub async fn create_cat(
    State(state): State<AppState>,
    ctx: CallerContext,
    payload: Result<Json<CreateCatRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Envelope<Cat>>)> {
    let request = json_body(payload)?;
    let cat = state.orchestrator.create_cat(&ctx, &request.name).await?;
    Ok((StatusCode::CREATED, Envelope::ok(cat)))
}

/// GET /cats
pub async fn list_cats(
    State(state): State<AppState>,
    ctx: CallerContext,
) -> ApiResult<Json<Envelope<Vec<Cat>>>> {
    let cats = state.orchestrator.list_cats(&ctx).await?;
    Ok(Envelope::ok(cats))
}

/// GET /cats/:id/history[?days=N]
pub async fn cat_history(
    State(state): State<AppState>,
    ctx: CallerContext,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<HistoryParams>, QueryRejection>,
) -> ApiResult<Json<Envelope<CatHistory>>> {
    let cat_id = path_id(path, "CAT_NOT_FOUND")?;
    let params = query_params(query)?;
    let history = state.reports.cat_history(&ctx, cat_id, params.days).await?;
    Ok(Envelope::ok(history))
}

pub fn cat_routes() -> Router<AppState> {
    Router::new()
        .route("/cats", post(create_cat).get(list_cats))
        .route("/cats/:id/history", get(cat_history))
}
