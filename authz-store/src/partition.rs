//! Partition manager (§4.2). Every operation is idempotent — safe to call
//! again if a previous caller already materialized the same partition, and
//! safe under concurrent creators since the underlying SQL uses
//! `IF [NOT] EXISTS`.

use sqlx::PgPool;

use crate::error::{DataError, SqlxErrorExt};

pub async fn ensure_realm_partitions(pool: &PgPool, realm_id: i64) -> Result<(), DataError> {
    sqlx::query("SELECT ensure_realm_partitions($1)")
        .bind(realm_id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
    Ok(())
}

pub async fn ensure_type_partitions(pool: &PgPool, realm_id: i64, resource_type_id: i64) -> Result<(), DataError> {
    sqlx::query("SELECT ensure_type_partitions($1, $2)")
        .bind(realm_id)
        .bind(resource_type_id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
    Ok(())
}

pub async fn drop_type_partitions(pool: &PgPool, realm_id: i64, resource_type_id: i64) -> Result<(), DataError> {
    sqlx::query("SELECT drop_type_partitions($1, $2)")
        .bind(realm_id)
        .bind(resource_type_id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
    Ok(())
}

pub async fn drop_realm_partitions(pool: &PgPool, realm_id: i64) -> Result<(), DataError> {
    sqlx::query("SELECT drop_realm_partitions($1)")
        .bind(realm_id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
    Ok(())
}

/// Confirms the leaf partition for `(realm_id, resource_type_id)` exists
/// before a resource/ACL/external-id insert (§3 invariant 1). Checked via
/// `to_regclass` rather than attempting the insert and inspecting the
/// error, so the caller gets a typed [`DataError::PartitionMissing`].
pub async fn require_type_partition(
    pool: &PgPool,
    realm_id: i64,
    resource_type_id: i64,
    realm_name: &str,
    resource_type_name: &str,
) -> Result<(), DataError> {
    let exists: Option<String> = sqlx::query_scalar(&format!(
        "SELECT to_regclass('resource_realm_{realm_id}_type_{resource_type_id}')::text"
    ))
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)?;

    if exists.is_none() {
        return Err(DataError::PartitionMissing {
            realm: realm_name.to_string(),
            resource_type: resource_type_name.to_string(),
        });
    }
    Ok(())
}
