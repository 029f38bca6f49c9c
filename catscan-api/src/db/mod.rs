//! Database access for the scan service
//!
//! Each submodule owns one table. Write helpers are generic over
//! `sqlx::Executor` so they run equally against the pool or inside a
//! transaction (`&mut *tx`).

pub mod cats;
pub mod checkup_reports;
pub mod images;
pub mod results;
pub mod sessions;

use catscan_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use uuid::Uuid;

use crate::models::{Artifact, ArtifactSlots, SlotKind};

/// Open the database file and make sure every table exists
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let pool = catscan_common::db::init_database(db_path).await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create service tables if they don't exist (idempotent)
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cats (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scan_sessions (
            id TEXT PRIMARY KEY,
            owner_id TEXT,
            cat_id TEXT REFERENCES cats(id),
            scan_type TEXT NOT NULL,
            checkup_type TEXT NOT NULL,
            status TEXT NOT NULL,
            latitude REAL,
            longitude REAL,
            place TEXT,
            informer TEXT,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scan_images (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES scan_sessions(id),
            original_id TEXT,
            original_url TEXT,
            preview_id TEXT,
            preview_url TEXT,
            roi_id TEXT,
            roi_url TEXT,
            remove_bg_id TEXT,
            remove_bg_url TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            CHECK ((original_id IS NULL) = (original_url IS NULL)),
            CHECK ((preview_id IS NULL) = (preview_url IS NULL)),
            CHECK ((roi_id IS NULL) = (roi_url IS NULL)),
            CHECK ((remove_bg_id IS NULL) = (remove_bg_url IS NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scan_results (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL UNIQUE REFERENCES scan_sessions(id),
            remarks TEXT,
            landmark_id TEXT,
            landmark_url TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            CHECK ((landmark_id IS NULL) = (landmark_url IS NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scan_result_details (
            id TEXT PRIMARY KEY,
            result_id TEXT NOT NULL REFERENCES scan_results(id),
            area_name TEXT NOT NULL,
            confidence_score REAL,
            label TEXT NOT NULL,
            description TEXT,
            advice TEXT,
            roi_id TEXT,
            roi_url TEXT,
            heatmap_id TEXT,
            heatmap_url TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            CHECK ((roi_id IS NULL) = (roi_url IS NULL)),
            CHECK ((heatmap_id IS NULL) = (heatmap_url IS NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS checkup_reports (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES scan_sessions(id) ON DELETE CASCADE,
            reporter_id TEXT,
            category TEXT NOT NULL,
            reasons TEXT NOT NULL DEFAULT '[]',
            description TEXT,
            contact TEXT,
            status TEXT NOT NULL,
            admin_notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    for index in [
        "CREATE INDEX IF NOT EXISTS idx_scan_sessions_owner ON scan_sessions(owner_id, created_at)",
        "CREATE INDEX IF NOT EXISTS idx_scan_sessions_cat ON scan_sessions(cat_id, created_at)",
        "CREATE INDEX IF NOT EXISTS idx_scan_images_session ON scan_images(session_id)",
        "CREATE INDEX IF NOT EXISTS idx_scan_result_details_result ON scan_result_details(result_id)",
        "CREATE INDEX IF NOT EXISTS idx_checkup_reports_session ON checkup_reports(session_id)",
        "CREATE INDEX IF NOT EXISTS idx_cats_owner ON cats(owner_id)",
    ] {
        sqlx::query(index).execute(pool).await?;
    }

    tracing::info!(
        "Database tables initialized (cats, scan_sessions, scan_images, scan_results, scan_result_details, checkup_reports)"
    );

    Ok(())
}

/// Parse a stored UUID column
pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Failed to parse stored id '{}': {}", value, e)))
}

pub(crate) fn parse_uuid_opt(value: Option<String>) -> Result<Option<Uuid>> {
    value.as_deref().map(parse_uuid).transpose()
}

/// Read the id/url column pairs of `kinds` into a slot map
pub(crate) fn read_slots(row: &SqliteRow, kinds: &[SlotKind]) -> Result<ArtifactSlots> {
    let mut slots = ArtifactSlots::new();
    for &kind in kinds {
        if let Some(artifact) = read_artifact(row, kind)? {
            slots.set(kind, artifact);
        }
    }
    Ok(slots)
}

pub(crate) fn read_artifact(row: &SqliteRow, kind: SlotKind) -> Result<Option<Artifact>> {
    let id: Option<String> = row.try_get(kind.id_column().as_str())?;
    let url: Option<String> = row.try_get(kind.url_column().as_str())?;
    Artifact::from_parts(kind, id, url)
        .map_err(|e| Error::Internal(format!("Corrupt artifact slot: {}", e)))
}
