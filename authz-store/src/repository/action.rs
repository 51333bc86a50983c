use sqlx::PgPool;

use crate::error::{DataError, SqlxErrorExt};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActionRow {
    pub id: i64,
    pub realm_id: i64,
    pub name: String,
}

pub async fn create(pool: &PgPool, realm_id: i64, name: &str) -> Result<ActionRow, DataError> {
    sqlx::query_as::<_, ActionRow>(
        "INSERT INTO action (realm_id, name) VALUES ($1, $2) RETURNING id, realm_id, name",
    )
    .bind(realm_id)
    .bind(name)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}

pub async fn find_by_name(pool: &PgPool, realm_id: i64, name: &str) -> Result<Option<ActionRow>, DataError> {
    sqlx::query_as::<_, ActionRow>(
        "SELECT id, realm_id, name FROM action WHERE realm_id = $1 AND name = $2",
    )
    .bind(realm_id)
    .bind(name)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}

/// Actions have no mutable fields beyond their name, so manifest apply
/// (§6.5) only needs create-if-missing, not a full upsert.
pub async fn create_if_missing(pool: &PgPool, realm_id: i64, name: &str) -> Result<ActionRow, DataError> {
    if let Some(existing) = find_by_name(pool, realm_id, name).await? {
        return Ok(existing);
    }
    create(pool, realm_id, name).await
}

pub async fn list_for_realm(pool: &PgPool, realm_id: i64) -> Result<Vec<ActionRow>, DataError> {
    sqlx::query_as::<_, ActionRow>("SELECT id, realm_id, name FROM action WHERE realm_id = $1")
        .bind(realm_id)
        .fetch_all(pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)
}

pub async fn delete(pool: &PgPool, realm_id: i64, action_id: i64) -> Result<(), DataError> {
    sqlx::query("DELETE FROM action WHERE realm_id = $1 AND id = $2")
        .bind(realm_id)
        .bind(action_id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
    Ok(())
}
