//! Scan session persistence and the aggregate delete cascade
//!
//! A session owns its images and its result (which owns the details).
//! Deleting a session walks those children explicitly, in a fixed order,
//! inside one transaction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;
use catscan_common::time;
use catscan_common::Result;

use super::{images, parse_uuid, parse_uuid_opt, results};
use crate::models::{Geolocation, ScanSession, SessionStatus};

const SESSION_COLUMNS: &str = "id, owner_id, cat_id, scan_type, checkup_type, status, \
     latitude, longitude, place, informer, notes, created_at, updated_at, deleted_at";

/// Which tier of delete to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Flag rows as deleted
    Soft,
    /// Physically remove rows, including previously soft-deleted ones
    Hard,
}

/// Rows touched by a cascade delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteSummary {
    pub sessions: u64,
    pub images: u64,
    pub results: u64,
    pub details: u64,
}

fn session_from_row(row: &SqliteRow) -> Result<ScanSession> {
    let id: String = row.try_get("id")?;
    let checkup_type: String = row.try_get("checkup_type")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(ScanSession {
        id: parse_uuid(&id)?,
        owner_id: row.try_get("owner_id")?,
        cat_id: parse_uuid_opt(row.try_get("cat_id")?)?,
        scan_type: row.try_get("scan_type")?,
        checkup_type: checkup_type.parse()?,
        status: status.parse()?,
        geolocation: Geolocation {
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            place: row.try_get("place")?,
        },
        informer: row.try_get("informer")?,
        notes: row.try_get("notes")?,
        created_at: time::from_db(&created_at)?,
        updated_at: time::from_db(&updated_at)?,
        deleted_at: time::from_db_opt(row.try_get("deleted_at")?)?,
    })
}

/// Insert a new session row
pub async fn insert_session<'e, E>(executor: E, session: &ScanSession) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO scan_sessions (
            id, owner_id, cat_id, scan_type, checkup_type, status,
            latitude, longitude, place, informer, notes,
            created_at, updated_at, deleted_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(session.id.to_string())
    .bind(&session.owner_id)
    .bind(session.cat_id.map(|id| id.to_string()))
    .bind(&session.scan_type)
    .bind(session.checkup_type.as_str())
    .bind(session.status.as_str())
    .bind(session.geolocation.latitude)
    .bind(session.geolocation.longitude)
    .bind(&session.geolocation.place)
    .bind(&session.informer)
    .bind(&session.notes)
    .bind(time::to_db(&session.created_at))
    .bind(time::to_db(&session.updated_at))
    .bind(session.deleted_at.as_ref().map(time::to_db))
    .execute(executor)
    .await?;

    Ok(())
}

/// Load a live (not soft-deleted) session
pub async fn find_session<'e, E>(executor: E, session_id: Uuid) -> Result<Option<ScanSession>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM scan_sessions WHERE id = ? AND deleted_at IS NULL",
        SESSION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(session_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(session_from_row).transpose()
}

/// Load a session whether or not it is soft-deleted
pub async fn find_session_including_deleted<'e, E>(
    executor: E,
    session_id: Uuid,
) -> Result<Option<ScanSession>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM scan_sessions WHERE id = ?", SESSION_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(session_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(session_from_row).transpose()
}

/// Move a live session from `from` to `to`
///
/// The update is conditional on the current status, so a concurrent
/// transition cannot be overwritten. Returns false if nothing matched.
pub async fn update_status<'e, E>(
    executor: E,
    session_id: Uuid,
    from: SessionStatus,
    to: SessionStatus,
    now: DateTime<Utc>,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE scan_sessions
        SET status = ?, updated_at = ?
        WHERE id = ? AND status = ? AND deleted_at IS NULL
        "#,
    )
    .bind(to.as_str())
    .bind(time::to_db(&now))
    .bind(session_id.to_string())
    .bind(from.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Assign unowned live sessions to `owner_id`
pub async fn claim_sessions(pool: &SqlitePool, session_ids: &[Uuid], owner_id: &str) -> Result<u64> {
    if session_ids.is_empty() {
        return Ok(0);
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE scan_sessions SET owner_id = ");
    qb.push_bind(owner_id.to_string());
    qb.push(", updated_at = ");
    qb.push_bind(time::to_db(&time::now()));
    qb.push(" WHERE owner_id IS NULL AND deleted_at IS NULL AND id IN (");
    let mut separated = qb.separated(", ");
    for id in session_ids {
        separated.push_bind(id.to_string());
    }
    separated.push_unseparated(")");

    let result = qb.build().execute(pool).await?;
    Ok(result.rows_affected())
}

/// Live sessions of an owner, newest first
pub async fn list_sessions_for_owner(pool: &SqlitePool, owner_id: &str) -> Result<Vec<ScanSession>> {
    let sql = format!(
        "SELECT {} FROM scan_sessions WHERE owner_id = ? AND deleted_at IS NULL \
         ORDER BY created_at DESC, id DESC",
        SESSION_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(owner_id).fetch_all(pool).await?;

    rows.iter().map(session_from_row).collect()
}

/// Live sessions among `session_ids`, newest first
pub async fn list_sessions_by_ids(pool: &SqlitePool, session_ids: &[Uuid]) -> Result<Vec<ScanSession>> {
    if session_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM scan_sessions WHERE deleted_at IS NULL AND id IN (",
        SESSION_COLUMNS
    ));
    let mut separated = qb.separated(", ");
    for id in session_ids {
        separated.push_bind(id.to_string());
    }
    separated.push_unseparated(") ORDER BY created_at DESC, id DESC");

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(session_from_row).collect()
}

/// Live sessions of a cat created at or after `since`, oldest first
pub async fn list_sessions_for_cat_since(
    pool: &SqlitePool,
    cat_id: Uuid,
    since: DateTime<Utc>,
) -> Result<Vec<ScanSession>> {
    let sql = format!(
        "SELECT {} FROM scan_sessions WHERE cat_id = ? AND deleted_at IS NULL AND created_at >= ? \
         ORDER BY created_at ASC, id ASC",
        SESSION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(cat_id.to_string())
        .bind(time::to_db(&since))
        .fetch_all(pool)
        .await?;

    rows.iter().map(session_from_row).collect()
}

/// Soft- or hard-delete a session and everything it owns
///
/// Order: images, then result details, then the result, then the session.
/// Running it again on an already deleted (or unknown) session changes
/// nothing and returns an all-zero summary.
pub async fn delete_session_cascade(
    pool: &SqlitePool,
    session_id: Uuid,
    mode: DeleteMode,
) -> Result<DeleteSummary> {
    let mut tx = pool.begin().await?;
    let mut summary = DeleteSummary::default();

    if find_session_including_deleted(&mut *tx, session_id).await?.is_none() {
        tx.rollback().await?;
        return Ok(summary);
    }

    let result = results::find_result_for_session(&mut *tx, session_id, true).await?;

    match mode {
        DeleteMode::Soft => {
            let now = time::now();
            summary.images = images::soft_delete_images_for_session(&mut *tx, session_id, now).await?;
            if let Some(result) = &result {
                summary.details = results::soft_delete_details(&mut *tx, result.id, now).await?;
                summary.results = results::soft_delete_result(&mut *tx, result.id, now).await?;
            }
            summary.sessions = sqlx::query(
                "UPDATE scan_sessions SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
            )
            .bind(time::to_db(&now))
            .bind(time::to_db(&now))
            .bind(session_id.to_string())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        DeleteMode::Hard => {
            summary.images = images::hard_delete_images_for_session(&mut *tx, session_id).await?;
            if let Some(result) = &result {
                summary.details = results::hard_delete_details(&mut *tx, result.id).await?;
                summary.results = results::hard_delete_result(&mut *tx, result.id).await?;
            }
            // checkup_reports follow through ON DELETE CASCADE
            summary.sessions = sqlx::query("DELETE FROM scan_sessions WHERE id = ?")
                .bind(session_id.to_string())
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
    }

    tx.commit().await?;

    tracing::info!(
        session_id = %session_id,
        mode = ?mode,
        sessions = summary.sessions,
        images = summary.images,
        results = summary.results,
        details = summary.details,
        "Session delete cascade finished"
    );

    Ok(summary)
}
