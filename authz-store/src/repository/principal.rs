use serde_json::Value as Json;
use sqlx::PgPool;

use crate::error::{DataError, SqlxErrorExt};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PrincipalRow {
    pub id: i64,
    pub realm_id: i64,
    pub username: String,
    pub attributes: Json,
}

/// Reserved principal representing an unauthenticated caller (§4.9).
pub const ANONYMOUS_PRINCIPAL_ID: i64 = 0;
/// Reserved role applying to every principal regardless of assignment (§3 invariant 3).
pub const WILDCARD_ROLE_ID: i64 = 0;

pub async fn find_by_id(pool: &PgPool, principal_id: i64) -> Result<Option<PrincipalRow>, DataError> {
    sqlx::query_as::<_, PrincipalRow>(
        "SELECT id, realm_id, username, attributes FROM principal WHERE id = $1",
    )
    .bind(principal_id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}

pub async fn find_by_username(pool: &PgPool, realm_id: i64, username: &str) -> Result<Option<PrincipalRow>, DataError> {
    sqlx::query_as::<_, PrincipalRow>(
        "SELECT id, realm_id, username, attributes FROM principal WHERE realm_id = $1 AND username = $2",
    )
    .bind(realm_id)
    .bind(username)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}

pub async fn role_ids(pool: &PgPool, principal_id: i64) -> Result<Vec<i64>, DataError> {
    if principal_id == ANONYMOUS_PRINCIPAL_ID {
        return Ok(Vec::new());
    }
    let ids: Vec<(i64,)> = sqlx::query_as("SELECT role_id FROM principal_roles WHERE principal_id = $1")
        .bind(principal_id)
        .fetch_all(pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
    Ok(ids.into_iter().map(|(id,)| id).collect())
}

/// Create-or-update a principal's role set by username, resolving or
/// creating the role rows as needed. Used by both CRUD and the
/// identity-provider sync collaborator.
pub async fn set_roles_by_name(pool: &PgPool, principal_id: i64, realm_id: i64, role_names: &[String]) -> Result<(), DataError> {
    let mut tx = pool.begin().await.map_err(SqlxErrorExt::into_data_error)?;

    sqlx::query("DELETE FROM principal_roles WHERE principal_id = $1")
        .bind(principal_id)
        .execute(&mut *tx)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;

    for name in role_names {
        let role_id: i64 = sqlx::query_scalar(
            "INSERT INTO auth_role (realm_id, name) VALUES ($1, $2)
             ON CONFLICT (realm_id, name) DO UPDATE SET name = EXCLUDED.name
             RETURNING id",
        )
        .bind(realm_id)
        .bind(name)
        .fetch_one(&mut *tx)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;

        sqlx::query(
            "INSERT INTO principal_roles (principal_id, role_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(principal_id)
        .bind(role_id)
        .execute(&mut *tx)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
    }

    tx.commit().await.map_err(SqlxErrorExt::into_data_error)
}

pub async fn list_for_realm(pool: &PgPool, realm_id: i64) -> Result<Vec<PrincipalRow>, DataError> {
    sqlx::query_as::<_, PrincipalRow>(
        "SELECT id, realm_id, username, attributes FROM principal WHERE realm_id = $1",
    )
    .bind(realm_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}

pub async fn delete(pool: &PgPool, realm_id: i64, principal_id: i64) -> Result<(), DataError> {
    sqlx::query("DELETE FROM principal WHERE realm_id = $1 AND id = $2")
        .bind(realm_id)
        .bind(principal_id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
    Ok(())
}

pub async fn upsert(pool: &PgPool, realm_id: i64, username: &str, attributes: &Json) -> Result<PrincipalRow, DataError> {
    sqlx::query_as::<_, PrincipalRow>(
        "INSERT INTO principal (realm_id, username, attributes) VALUES ($1, $2, $3)
         ON CONFLICT (realm_id, username) DO UPDATE SET attributes = EXCLUDED.attributes, updated_at = now()
         RETURNING id, realm_id, username, attributes",
    )
    .bind(realm_id)
    .bind(username)
    .bind(attributes)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}
