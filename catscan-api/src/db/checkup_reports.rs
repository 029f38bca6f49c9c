//! Checkup report persistence
//!
//! Reasons are stored as a JSON array of strings.

use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use uuid::Uuid;
use catscan_common::time;
use catscan_common::{Error, Result};

use super::parse_uuid;
use crate::models::CheckupReport;

fn report_from_row(row: &SqliteRow) -> Result<CheckupReport> {
    let id: String = row.try_get("id")?;
    let session_id: String = row.try_get("session_id")?;
    let category: String = row.try_get("category")?;
    let status: String = row.try_get("status")?;
    let reasons: String = row.try_get("reasons")?;
    let reasons: Vec<String> = serde_json::from_str(&reasons)
        .map_err(|e| Error::Internal(format!("Failed to deserialize reasons: {}", e)))?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(CheckupReport {
        id: parse_uuid(&id)?,
        session_id: parse_uuid(&session_id)?,
        reporter_id: row.try_get("reporter_id")?,
        category: category.parse()?,
        reasons,
        description: row.try_get("description")?,
        contact: row.try_get("contact")?,
        status: status.parse()?,
        admin_notes: row.try_get("admin_notes")?,
        created_at: time::from_db(&created_at)?,
        updated_at: time::from_db(&updated_at)?,
    })
}

pub async fn insert_report<'e, E>(executor: E, report: &CheckupReport) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let reasons = serde_json::to_string(&report.reasons)
        .map_err(|e| Error::Internal(format!("Failed to serialize reasons: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO checkup_reports (
            id, session_id, reporter_id, category, reasons, description,
            contact, status, admin_notes, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(report.id.to_string())
    .bind(report.session_id.to_string())
    .bind(&report.reporter_id)
    .bind(report.category.as_str())
    .bind(reasons)
    .bind(&report.description)
    .bind(&report.contact)
    .bind(report.status.as_str())
    .bind(&report.admin_notes)
    .bind(time::to_db(&report.created_at))
    .bind(time::to_db(&report.updated_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// Reports filed against a session, oldest first
pub async fn list_reports_for_session<'e, E>(executor: E, session_id: Uuid) -> Result<Vec<CheckupReport>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, session_id, reporter_id, category, reasons, description,
               contact, status, admin_notes, created_at, updated_at
        FROM checkup_reports
        WHERE session_id = ?
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(session_id.to_string())
    .fetch_all(executor)
    .await?;

    rows.iter().map(report_from_row).collect()
}
