//! Liveness and database probe

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use std::time::Instant;

use crate::AppState;

pub const MODULE_NAME: &str = "catscan-api";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" when the database answers, "degraded" otherwise
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub git_hash: &'static str,
    pub uptime_seconds: u64,
    /// Round trip of `SELECT 1`, absent when the probe failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_latency_ms: Option<u64>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds()
        .max(0) as u64;

    let probe_started = Instant::now();
    let db_latency_ms = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => Some(probe_started.elapsed().as_millis() as u64),
        Err(e) => {
            tracing::warn!(error = %e, "Health check database probe failed");
            None
        }
    };

    Json(HealthResponse {
        status: if db_latency_ms.is_some() { "ok" } else { "degraded" },
        module: MODULE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        git_hash: env!("GIT_HASH"),
        uptime_seconds,
        db_latency_ms,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
