use serde_json::Value as Json;
use sqlx::PgPool;

use crate::error::{DataError, SqlxErrorExt};
use crate::partition;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AclRow {
    pub id: i64,
    pub realm_id: i64,
    pub resource_type_id: i64,
    pub action_id: i64,
    pub principal_id: Option<i64>,
    pub role_id: Option<i64>,
    pub resource_id: Option<i64>,
    pub conditions: Option<Json>,
    pub compiled_sql: Option<String>,
}

/// Create or update the condition tree for a selector tuple (§3 "upsert on
/// conditions"). `compiled_sql` is maintained by the `acl_compile_conditions`
/// trigger, not set here.
#[allow(clippy::too_many_arguments)]
pub async fn upsert(
    pool: &PgPool,
    realm_id: i64,
    resource_type_id: i64,
    action_id: i64,
    principal_id: i64,
    role_id: i64,
    resource_id: Option<i64>,
    conditions: Option<&Json>,
    realm_name: &str,
    resource_type_name: &str,
) -> Result<AclRow, DataError> {
    partition::require_type_partition(pool, realm_id, resource_type_id, realm_name, resource_type_name).await?;

    sqlx::query_as::<_, AclRow>(
        "INSERT INTO acl (realm_id, resource_type_id, action_id, principal_id, role_id, resource_id, conditions)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (realm_id, resource_type_id, action_id, principal_id, role_id, resource_id)
         DO UPDATE SET conditions = EXCLUDED.conditions, updated_at = now()
         RETURNING id, realm_id, resource_type_id, action_id, principal_id, role_id, resource_id, conditions, compiled_sql",
    )
    .bind(realm_id)
    .bind(resource_type_id)
    .bind(action_id)
    .bind(principal_id)
    .bind(role_id)
    .bind(resource_id)
    .bind(conditions)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}

pub async fn delete(pool: &PgPool, realm_id: i64, resource_type_id: i64, acl_id: i64) -> Result<(), DataError> {
    sqlx::query("DELETE FROM acl WHERE realm_id = $1 AND resource_type_id = $2 AND id = $3")
        .bind(realm_id)
        .bind(resource_type_id)
        .bind(acl_id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
    Ok(())
}

pub async fn list_for_type(pool: &PgPool, realm_id: i64, resource_type_id: i64) -> Result<Vec<AclRow>, DataError> {
    sqlx::query_as::<_, AclRow>(
        "SELECT id, realm_id, resource_type_id, action_id, principal_id, role_id, resource_id, conditions, compiled_sql
         FROM acl WHERE realm_id = $1 AND resource_type_id = $2",
    )
    .bind(realm_id)
    .bind(resource_type_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}
