//! catscan-api library interface
//!
//! Exposes the router and state so integration tests can drive the service
//! in-process.

pub mod api;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::services::{ArtifactStore, RecognitionGateway, ReportAggregator, ScanOrchestrator};

/// Floor for the request body cap
const MIN_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub orchestrator: Arc<ScanOrchestrator>,
    pub reports: ReportAggregator,
    pub config: Arc<ServiceConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: ServiceConfig,
        gateway: Arc<dyn RecognitionGateway>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        let orchestrator = ScanOrchestrator::new(
            db.clone(),
            gateway,
            store,
            config.upload_rules.clone(),
            config.artifact_bucket.clone(),
        );

        Self {
            reports: ReportAggregator::new(db.clone()),
            db,
            orchestrator: Arc::new(orchestrator),
            config: Arc::new(config),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    // Body cap stays above the upload limit; oversize is reported by the validator
    let body_limit = state
        .config
        .upload_rules
        .max_bytes
        .saturating_mul(4)
        .max(MIN_BODY_LIMIT);

    Router::new()
        .merge(api::scan_routes())
        .merge(api::hook_routes())
        .merge(api::checkup_report_routes())
        .merge(api::artifact_routes())
        .merge(api::cat_routes())
        .merge(api::dashboard_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
