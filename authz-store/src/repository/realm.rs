use std::collections::HashMap;

use serde_json::Value as Json;
use sqlx::PgPool;

use authz_cache::RealmMap;

use crate::error::{DataError, SqlxErrorExt};
use crate::partition;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RealmRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub public_key: Option<String>,
    pub algorithm: Option<String>,
    pub keycloak_config: Option<Json>,
}

pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<RealmRow>, DataError> {
    sqlx::query_as::<_, RealmRow>(
        "SELECT id, name, description, is_active, public_key, algorithm, keycloak_config
         FROM realm WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}

pub async fn create(pool: &PgPool, name: &str, description: Option<&str>) -> Result<RealmRow, DataError> {
    let row = sqlx::query_as::<_, RealmRow>(
        "INSERT INTO realm (name, description) VALUES ($1, $2)
         RETURNING id, name, description, is_active, public_key, algorithm, keycloak_config",
    )
    .bind(name)
    .bind(description)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)?;

    partition::ensure_realm_partitions(pool, row.id).await?;
    Ok(row)
}

/// Same as [`create`] but carries the full set of manifest-declarable
/// fields (§3.1) in one round trip, for manifest apply's create path.
pub async fn create_full(
    pool: &PgPool,
    name: &str,
    description: Option<&str>,
    public_key: Option<&str>,
    algorithm: Option<&str>,
    keycloak_config: Option<&Json>,
) -> Result<RealmRow, DataError> {
    let row = sqlx::query_as::<_, RealmRow>(
        "INSERT INTO realm (name, description, public_key, algorithm, keycloak_config)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, name, description, is_active, public_key, algorithm, keycloak_config",
    )
    .bind(name)
    .bind(description)
    .bind(public_key)
    .bind(algorithm)
    .bind(keycloak_config)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)?;

    partition::ensure_realm_partitions(pool, row.id).await?;
    Ok(row)
}

/// Manifest apply's update mode (§6.5) only ever touches description and
/// the IdP config; renames and key rotation go through a dedicated admin
/// call, not the manifest path.
pub async fn update(
    pool: &PgPool,
    realm_id: i64,
    description: Option<&str>,
    keycloak_config: Option<&Json>,
) -> Result<RealmRow, DataError> {
    sqlx::query_as::<_, RealmRow>(
        "UPDATE realm SET description = $2, keycloak_config = $3, updated_at = now()
         WHERE id = $1
         RETURNING id, name, description, is_active, public_key, algorithm, keycloak_config",
    )
    .bind(realm_id)
    .bind(description)
    .bind(keycloak_config)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}

/// Realms with a non-null `keycloak_config`, for the sync scheduler's poll
/// loop to filter by `enabled` (§6.5).
pub async fn list_keycloak_configured(pool: &PgPool) -> Result<Vec<RealmRow>, DataError> {
    sqlx::query_as::<_, RealmRow>(
        "SELECT id, name, description, is_active, public_key, algorithm, keycloak_config
         FROM realm WHERE is_active AND keycloak_config IS NOT NULL",
    )
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}

pub async fn delete(pool: &PgPool, realm_id: i64) -> Result<(), DataError> {
    sqlx::query("DELETE FROM realm WHERE id = $1")
        .bind(realm_id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
    partition::drop_realm_partitions(pool, realm_id).await
}

/// Reads the five realm-scoped tables in one transaction and assembles the
/// `RealmMap` the cache layer stores whole under `realm:<name>` (§4.3).
pub async fn load_realm_map(pool: &PgPool, name: &str) -> Result<Option<RealmMap>, DataError> {
    let mut tx = pool.begin().await.map_err(SqlxErrorExt::into_data_error)?;

    let realm: Option<RealmRow> = sqlx::query_as::<_, RealmRow>(
        "SELECT id, name, description, is_active, public_key, algorithm, keycloak_config
         FROM realm WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(&mut *tx)
    .await
    .map_err(SqlxErrorExt::into_data_error)?;

    let Some(realm) = realm else {
        return Ok(None);
    };

    let actions: Vec<(String, i64)> = sqlx::query_as("SELECT name, id FROM action WHERE realm_id = $1")
        .bind(realm.id)
        .fetch_all(&mut *tx)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;

    let types: Vec<(String, i64, bool)> =
        sqlx::query_as("SELECT name, id, is_public FROM resource_type WHERE realm_id = $1")
            .bind(realm.id)
            .fetch_all(&mut *tx)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;

    let roles: Vec<(String, i64)> = sqlx::query_as("SELECT name, id FROM auth_role WHERE realm_id = $1")
        .bind(realm.id)
        .fetch_all(&mut *tx)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;

    tx.commit().await.map_err(SqlxErrorExt::into_data_error)?;

    let mut type_map = HashMap::new();
    let mut type_public = HashMap::new();
    for (name, id, is_public) in types {
        type_map.insert(name.clone(), id);
        type_public.insert(name, is_public);
    }

    Ok(Some(RealmMap {
        id: realm.id,
        public_key: realm.public_key,
        algorithm: realm.algorithm,
        actions: actions.into_iter().collect(),
        types: type_map,
        type_public,
        roles: roles.into_iter().collect(),
    }))
}
