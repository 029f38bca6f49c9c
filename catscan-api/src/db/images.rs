//! Scan image persistence

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use uuid::Uuid;
use catscan_common::time;
use catscan_common::Result;

use super::{parse_uuid, read_slots};
use crate::models::{Artifact, ScanImage, SlotKind};

const IMAGE_COLUMNS: &str = "id, session_id, original_id, original_url, preview_id, preview_url, \
     roi_id, roi_url, remove_bg_id, remove_bg_url, created_at, updated_at, deleted_at";

fn image_from_row(row: &SqliteRow) -> Result<ScanImage> {
    let id: String = row.try_get("id")?;
    let session_id: String = row.try_get("session_id")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(ScanImage {
        id: parse_uuid(&id)?,
        session_id: parse_uuid(&session_id)?,
        slots: read_slots(row, &SlotKind::IMAGE_SLOTS)?,
        created_at: time::from_db(&created_at)?,
        updated_at: time::from_db(&updated_at)?,
        deleted_at: time::from_db_opt(row.try_get("deleted_at")?)?,
    })
}

/// Insert an image row with whatever slots are populated
pub async fn insert_image<'e, E>(executor: E, image: &ScanImage) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (original_id, original_url) = image.slots.columns(SlotKind::Original);
    let (preview_id, preview_url) = image.slots.columns(SlotKind::Preview);
    let (roi_id, roi_url) = image.slots.columns(SlotKind::Roi);
    let (remove_bg_id, remove_bg_url) = image.slots.columns(SlotKind::RemoveBg);

    sqlx::query(
        r#"
        INSERT INTO scan_images (
            id, session_id,
            original_id, original_url, preview_id, preview_url,
            roi_id, roi_url, remove_bg_id, remove_bg_url,
            created_at, updated_at, deleted_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(image.id.to_string())
    .bind(image.session_id.to_string())
    .bind(original_id)
    .bind(original_url)
    .bind(preview_id)
    .bind(preview_url)
    .bind(roi_id)
    .bind(roi_url)
    .bind(remove_bg_id)
    .bind(remove_bg_url)
    .bind(time::to_db(&image.created_at))
    .bind(time::to_db(&image.updated_at))
    .bind(image.deleted_at.as_ref().map(time::to_db))
    .execute(executor)
    .await?;

    Ok(())
}

/// Live images of a session, oldest first
pub async fn list_images_for_session<'e, E>(executor: E, session_id: Uuid) -> Result<Vec<ScanImage>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM scan_images WHERE session_id = ? AND deleted_at IS NULL \
         ORDER BY created_at ASC, id ASC",
        IMAGE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(session_id.to_string())
        .fetch_all(executor)
        .await?;

    rows.iter().map(image_from_row).collect()
}

/// Most recent live image of a session
pub async fn latest_image_for_session<'e, E>(executor: E, session_id: Uuid) -> Result<Option<ScanImage>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM scan_images WHERE session_id = ? AND deleted_at IS NULL \
         ORDER BY created_at DESC, id DESC LIMIT 1",
        IMAGE_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(session_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(image_from_row).transpose()
}

/// Overwrite one artifact slot of a live image
///
/// Both halves are written by the same statement. Returns false if the image
/// no longer exists.
pub async fn write_slot<'e, E>(
    executor: E,
    image_id: Uuid,
    slot: SlotKind,
    artifact: &Artifact,
    now: DateTime<Utc>,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    // Column names come from a closed enum, never from input
    let sql = format!(
        "UPDATE scan_images SET {} = ?, {} = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        slot.id_column(),
        slot.url_column()
    );
    let result = sqlx::query(&sql)
        .bind(&artifact.id)
        .bind(&artifact.url)
        .bind(time::to_db(&now))
        .bind(image_id.to_string())
        .execute(executor)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn soft_delete_images_for_session<'e, E>(
    executor: E,
    session_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE scan_images SET deleted_at = ?, updated_at = ? WHERE session_id = ? AND deleted_at IS NULL",
    )
    .bind(time::to_db(&now))
    .bind(time::to_db(&now))
    .bind(session_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Remove every image row of a session, soft-deleted ones included
pub async fn hard_delete_images_for_session<'e, E>(executor: E, session_id: Uuid) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM scan_images WHERE session_id = ?")
        .bind(session_id.to_string())
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}
