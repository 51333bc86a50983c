use serde_json::Value as Json;
use sqlx::PgPool;

use crate::error::{DataError, SqlxErrorExt};
use crate::partition;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResourceTypeRow {
    pub id: i64,
    pub realm_id: i64,
    pub name: String,
    pub is_public: bool,
    pub attribute_schema: Option<Json>,
}

/// Creates a resource type and immediately provisions its leaf partitions
/// (§4.2: types come before resources and ACLs in manifest apply order
/// precisely because the partition manager requires it).
pub async fn create(
    pool: &PgPool,
    realm_id: i64,
    name: &str,
    is_public: bool,
    attribute_schema: Option<&Json>,
) -> Result<ResourceTypeRow, DataError> {
    let row = sqlx::query_as::<_, ResourceTypeRow>(
        "INSERT INTO resource_type (realm_id, name, is_public, attribute_schema)
         VALUES ($1, $2, $3, $4)
         RETURNING id, realm_id, name, is_public, attribute_schema",
    )
    .bind(realm_id)
    .bind(name)
    .bind(is_public)
    .bind(attribute_schema)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)?;

    partition::ensure_type_partitions(pool, realm_id, row.id).await?;
    Ok(row)
}

/// Create-or-update a resource type by name, provisioning partitions only on
/// the create path — manifest apply (§6.5) runs this once per declared type
/// regardless of whether the realm already had it.
pub async fn upsert(
    pool: &PgPool,
    realm_id: i64,
    name: &str,
    is_public: bool,
    attribute_schema: Option<&Json>,
) -> Result<ResourceTypeRow, DataError> {
    if let Some(existing) = find_by_name(pool, realm_id, name).await? {
        let row = sqlx::query_as::<_, ResourceTypeRow>(
            "UPDATE resource_type SET is_public = $3, attribute_schema = $4, updated_at = now()
             WHERE realm_id = $1 AND id = $2
             RETURNING id, realm_id, name, is_public, attribute_schema",
        )
        .bind(realm_id)
        .bind(existing.id)
        .bind(is_public)
        .bind(attribute_schema)
        .fetch_one(pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
        return Ok(row);
    }
    create(pool, realm_id, name, is_public, attribute_schema).await
}

pub async fn find_by_name(
    pool: &PgPool,
    realm_id: i64,
    name: &str,
) -> Result<Option<ResourceTypeRow>, DataError> {
    sqlx::query_as::<_, ResourceTypeRow>(
        "SELECT id, realm_id, name, is_public, attribute_schema FROM resource_type
         WHERE realm_id = $1 AND name = $2",
    )
    .bind(realm_id)
    .bind(name)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}

pub async fn list_for_realm(pool: &PgPool, realm_id: i64) -> Result<Vec<ResourceTypeRow>, DataError> {
    sqlx::query_as::<_, ResourceTypeRow>(
        "SELECT id, realm_id, name, is_public, attribute_schema FROM resource_type WHERE realm_id = $1",
    )
    .bind(realm_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}

pub async fn delete(pool: &PgPool, realm_id: i64, type_id: i64) -> Result<(), DataError> {
    sqlx::query("DELETE FROM resource_type WHERE realm_id = $1 AND id = $2")
        .bind(realm_id)
        .bind(type_id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
    partition::drop_type_partitions(pool, realm_id, type_id).await
}
