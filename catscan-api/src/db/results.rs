//! Scan result and result detail persistence

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;
use catscan_common::time;
use catscan_common::Result;

use super::{parse_uuid, read_artifact, read_slots};
use crate::models::{ScanResult, ScanResultDetail, SlotKind};

const RESULT_COLUMNS: &str =
    "id, session_id, remarks, landmark_id, landmark_url, created_at, updated_at, deleted_at";

const DETAIL_COLUMNS: &str = "id, result_id, area_name, confidence_score, label, description, advice, \
     roi_id, roi_url, heatmap_id, heatmap_url, created_at, updated_at, deleted_at";

fn result_from_row(row: &SqliteRow) -> Result<ScanResult> {
    let id: String = row.try_get("id")?;
    let session_id: String = row.try_get("session_id")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(ScanResult {
        id: parse_uuid(&id)?,
        session_id: parse_uuid(&session_id)?,
        remarks: row.try_get("remarks")?,
        landmark: read_artifact(row, SlotKind::Landmark)?,
        created_at: time::from_db(&created_at)?,
        updated_at: time::from_db(&updated_at)?,
        deleted_at: time::from_db_opt(row.try_get("deleted_at")?)?,
    })
}

fn detail_from_row(row: &SqliteRow) -> Result<ScanResultDetail> {
    let id: String = row.try_get("id")?;
    let result_id: String = row.try_get("result_id")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(ScanResultDetail {
        id: parse_uuid(&id)?,
        result_id: parse_uuid(&result_id)?,
        area_name: row.try_get("area_name")?,
        confidence_score: row.try_get("confidence_score")?,
        label: row.try_get("label")?,
        description: row.try_get("description")?,
        advice: row.try_get("advice")?,
        slots: read_slots(row, &SlotKind::DETAIL_SLOTS)?,
        created_at: time::from_db(&created_at)?,
        updated_at: time::from_db(&updated_at)?,
        deleted_at: time::from_db_opt(row.try_get("deleted_at")?)?,
    })
}

pub async fn insert_result<'e, E>(executor: E, result: &ScanResult) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO scan_results (
            id, session_id, remarks, landmark_id, landmark_url,
            created_at, updated_at, deleted_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(result.id.to_string())
    .bind(result.session_id.to_string())
    .bind(&result.remarks)
    .bind(result.landmark.as_ref().map(|a| a.id.as_str()))
    .bind(result.landmark.as_ref().map(|a| a.url.as_str()))
    .bind(time::to_db(&result.created_at))
    .bind(time::to_db(&result.updated_at))
    .bind(result.deleted_at.as_ref().map(time::to_db))
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn insert_detail<'e, E>(executor: E, detail: &ScanResultDetail) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (roi_id, roi_url) = detail.slots.columns(SlotKind::Roi);
    let (heatmap_id, heatmap_url) = detail.slots.columns(SlotKind::Heatmap);

    sqlx::query(
        r#"
        INSERT INTO scan_result_details (
            id, result_id, area_name, confidence_score, label, description, advice,
            roi_id, roi_url, heatmap_id, heatmap_url,
            created_at, updated_at, deleted_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(detail.id.to_string())
    .bind(detail.result_id.to_string())
    .bind(&detail.area_name)
    .bind(detail.confidence_score)
    .bind(&detail.label)
    .bind(&detail.description)
    .bind(&detail.advice)
    .bind(roi_id)
    .bind(roi_url)
    .bind(heatmap_id)
    .bind(heatmap_url)
    .bind(time::to_db(&detail.created_at))
    .bind(time::to_db(&detail.updated_at))
    .bind(detail.deleted_at.as_ref().map(time::to_db))
    .execute(executor)
    .await?;

    Ok(())
}

/// Load the result of a session
///
/// With `include_deleted` the soft-deleted row is returned too.
pub async fn find_result_for_session<'e, E>(
    executor: E,
    session_id: Uuid,
    include_deleted: bool,
) -> Result<Option<ScanResult>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let filter = if include_deleted { "" } else { " AND deleted_at IS NULL" };
    let sql = format!(
        "SELECT {} FROM scan_results WHERE session_id = ?{}",
        RESULT_COLUMNS, filter
    );
    let row = sqlx::query(&sql)
        .bind(session_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(result_from_row).transpose()
}

/// Live details of a result, in insertion order
pub async fn list_details<'e, E>(executor: E, result_id: Uuid) -> Result<Vec<ScanResultDetail>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM scan_result_details WHERE result_id = ? AND deleted_at IS NULL \
         ORDER BY created_at ASC, id ASC",
        DETAIL_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(result_id.to_string())
        .fetch_all(executor)
        .await?;

    rows.iter().map(detail_from_row).collect()
}

/// Detail labels of the live results of `session_ids`, as (session id, label)
pub async fn labels_for_sessions(pool: &SqlitePool, session_ids: &[Uuid]) -> Result<Vec<(Uuid, String)>> {
    if session_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT r.session_id AS session_id, d.label AS label \
         FROM scan_result_details d \
         JOIN scan_results r ON d.result_id = r.id \
         WHERE r.deleted_at IS NULL AND d.deleted_at IS NULL AND r.session_id IN (",
    );
    let mut separated = qb.separated(", ");
    for id in session_ids {
        separated.push_bind(id.to_string());
    }
    separated.push_unseparated(")");

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter()
        .map(|row| -> Result<(Uuid, String)> {
            let session_id: String = row.try_get("session_id")?;
            let label: String = row.try_get("label")?;
            Ok((parse_uuid(&session_id)?, label))
        })
        .collect()
}

pub async fn soft_delete_details<'e, E>(executor: E, result_id: Uuid, now: DateTime<Utc>) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE scan_result_details SET deleted_at = ?, updated_at = ? WHERE result_id = ? AND deleted_at IS NULL",
    )
    .bind(time::to_db(&now))
    .bind(time::to_db(&now))
    .bind(result_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

pub async fn soft_delete_result<'e, E>(executor: E, result_id: Uuid, now: DateTime<Utc>) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE scan_results SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(time::to_db(&now))
    .bind(time::to_db(&now))
    .bind(result_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Remove every detail row of a result, soft-deleted ones included
pub async fn hard_delete_details<'e, E>(executor: E, result_id: Uuid) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM scan_result_details WHERE result_id = ?")
        .bind(result_id.to_string())
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

pub async fn hard_delete_result<'e, E>(executor: E, result_id: Uuid) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM scan_results WHERE id = ?")
        .bind(result_id.to_string())
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}
