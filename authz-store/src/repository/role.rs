use serde_json::Value as Json;
use sqlx::PgPool;

use crate::error::{DataError, SqlxErrorExt};

/// Create-or-update a role by name within a realm, independent of any
/// principal assignment — used by the identity-provider sync collaborator to
/// materialize roles the provider knows about before any user references
/// them (§6.5 "fetch the provider's roles, create-or-update each by name").
pub async fn upsert(pool: &PgPool, realm_id: i64, name: &str) -> Result<i64, DataError> {
    sqlx::query_scalar(
        "INSERT INTO auth_role (realm_id, name) VALUES ($1, $2)
         ON CONFLICT (realm_id, name) DO UPDATE SET name = EXCLUDED.name
         RETURNING id",
    )
    .bind(realm_id)
    .bind(name)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}

/// Same as [`upsert`] but also carries the role's attribute mapping, used by
/// manifest apply (§6.5) where roles declare how IdP attributes resolve onto
/// this role's principals.
pub async fn upsert_with_mapping(
    pool: &PgPool,
    realm_id: i64,
    name: &str,
    attribute_mapping: Option<&Json>,
) -> Result<RoleRow, DataError> {
    sqlx::query_as::<_, RoleRow>(
        "INSERT INTO auth_role (realm_id, name, attribute_mapping) VALUES ($1, $2, $3)
         ON CONFLICT (realm_id, name) DO UPDATE SET attribute_mapping = EXCLUDED.attribute_mapping, updated_at = now()
         RETURNING id, realm_id, name, attribute_mapping",
    )
    .bind(realm_id)
    .bind(name)
    .bind(attribute_mapping)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}

pub async fn find_by_name(pool: &PgPool, realm_id: i64, name: &str) -> Result<Option<RoleRow>, DataError> {
    sqlx::query_as::<_, RoleRow>(
        "SELECT id, realm_id, name, attribute_mapping FROM auth_role WHERE realm_id = $1 AND name = $2",
    )
    .bind(realm_id)
    .bind(name)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RoleRow {
    pub id: i64,
    pub realm_id: i64,
    pub name: String,
    pub attribute_mapping: Option<Json>,
}

pub async fn list_for_realm(pool: &PgPool, realm_id: i64) -> Result<Vec<RoleRow>, DataError> {
    sqlx::query_as::<_, RoleRow>(
        "SELECT id, realm_id, name, attribute_mapping FROM auth_role WHERE realm_id = $1",
    )
    .bind(realm_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}

pub async fn delete(pool: &PgPool, realm_id: i64, role_id: i64) -> Result<(), DataError> {
    sqlx::query("DELETE FROM auth_role WHERE realm_id = $1 AND id = $2")
        .bind(realm_id)
        .bind(role_id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
    Ok(())
}
