//! Cat persistence

use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use uuid::Uuid;
use catscan_common::time;
use catscan_common::Result;

use super::parse_uuid;
use crate::models::Cat;

fn cat_from_row(row: &SqliteRow) -> Result<Cat> {
    let id: String = row.try_get("id")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Cat {
        id: parse_uuid(&id)?,
        owner_id: row.try_get("owner_id")?,
        name: row.try_get("name")?,
        created_at: time::from_db(&created_at)?,
        updated_at: time::from_db(&updated_at)?,
    })
}

pub async fn insert_cat<'e, E>(executor: E, cat: &Cat) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO cats (id, owner_id, name, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(cat.id.to_string())
    .bind(&cat.owner_id)
    .bind(&cat.name)
    .bind(time::to_db(&cat.created_at))
    .bind(time::to_db(&cat.updated_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// Live cat owned by `owner_id`
pub async fn find_cat_for_owner<'e, E>(executor: E, cat_id: Uuid, owner_id: &str) -> Result<Option<Cat>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT id, owner_id, name, created_at, updated_at
        FROM cats
        WHERE id = ? AND owner_id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(cat_id.to_string())
    .bind(owner_id)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(cat_from_row).transpose()
}

pub async fn list_cats_for_owner<'e, E>(executor: E, owner_id: &str) -> Result<Vec<Cat>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, owner_id, name, created_at, updated_at
        FROM cats
        WHERE owner_id = ? AND deleted_at IS NULL
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(owner_id)
    .fetch_all(executor)
    .await?;

    rows.iter().map(cat_from_row).collect()
}

pub async fn count_cats_for_owner<'e, E>(executor: E, owner_id: &str) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM cats WHERE owner_id = ? AND deleted_at IS NULL")
            .bind(owner_id)
            .fetch_one(executor)
            .await?;

    Ok(count)
}
