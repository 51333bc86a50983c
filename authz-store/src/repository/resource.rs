use serde_json::Value as Json;
use sqlx::PgPool;

use crate::error::{DataError, SqlxErrorExt};
use crate::geometry::{self, ParsedGeometry};
use crate::partition;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResourceRow {
    pub id: i64,
    pub realm_id: i64,
    pub resource_type_id: i64,
    pub attributes: Json,
}

pub async fn create(
    pool: &PgPool,
    realm_id: i64,
    resource_type_id: i64,
    attributes: &Json,
    geometry_input: Option<&Json>,
    realm_name: &str,
    resource_type_name: &str,
) -> Result<ResourceRow, DataError> {
    partition::require_type_partition(pool, realm_id, resource_type_id, realm_name, resource_type_name).await?;

    let parsed_geom: Option<ParsedGeometry> = match geometry_input {
        Some(value) => geometry::parse(value, None).map_err(|e| DataError::Other(e.to_string()))?,
        None => None,
    };

    let query = match &parsed_geom {
        Some(g) => format!(
            "INSERT INTO resource (realm_id, resource_type_id, attributes, geometry)
             VALUES ($1, $2, $3, {})
             RETURNING id, realm_id, resource_type_id, attributes",
            geometry::to_sql_expr(g)
        ),
        None => "INSERT INTO resource (realm_id, resource_type_id, attributes)
                 VALUES ($1, $2, $3)
                 RETURNING id, realm_id, resource_type_id, attributes"
            .to_string(),
    };

    sqlx::query_as::<_, ResourceRow>(&query)
        .bind(realm_id)
        .bind(resource_type_id)
        .bind(attributes)
        .fetch_one(pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)
}

/// Merges `patch` onto the resource's existing `attributes` (shallow,
/// `jsonb ||`) and optionally reprojects its geometry — used by manifest
/// apply's update mode (§6.5) and the admin resource-patch endpoint.
pub async fn update_attributes(
    pool: &PgPool,
    realm_id: i64,
    resource_type_id: i64,
    resource_id: i64,
    patch: &Json,
    geometry_input: Option<&Json>,
) -> Result<ResourceRow, DataError> {
    let parsed_geom: Option<ParsedGeometry> = match geometry_input {
        Some(value) => geometry::parse(value, None).map_err(|e| DataError::Other(e.to_string()))?,
        None => None,
    };

    let query = match &parsed_geom {
        Some(g) => format!(
            "UPDATE resource SET attributes = attributes || $4, geometry = {}, updated_at = now()
             WHERE realm_id = $1 AND resource_type_id = $2 AND id = $3
             RETURNING id, realm_id, resource_type_id, attributes",
            geometry::to_sql_expr(g)
        ),
        None => "UPDATE resource SET attributes = attributes || $4, updated_at = now()
                 WHERE realm_id = $1 AND resource_type_id = $2 AND id = $3
                 RETURNING id, realm_id, resource_type_id, attributes"
            .to_string(),
    };

    sqlx::query_as::<_, ResourceRow>(&query)
        .bind(realm_id)
        .bind(resource_type_id)
        .bind(resource_id)
        .bind(patch)
        .fetch_optional(pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?
        .ok_or_else(|| DataError::NotFound(format!("resource {resource_id} in realm {realm_id}")))
}

pub async fn find_by_external_id(
    pool: &PgPool,
    realm_id: i64,
    resource_type_id: i64,
    external_id: &str,
) -> Result<Option<ResourceRow>, DataError> {
    sqlx::query_as::<_, ResourceRow>(
        "SELECT r.id, r.realm_id, r.resource_type_id, r.attributes
         FROM resource r
         JOIN external_ids e ON e.realm_id = r.realm_id
             AND e.resource_type_id = r.resource_type_id
             AND e.resource_id = r.id
         WHERE r.realm_id = $1 AND r.resource_type_id = $2 AND e.external_id = $3",
    )
    .bind(realm_id)
    .bind(resource_type_id)
    .bind(external_id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}

pub async fn delete(pool: &PgPool, realm_id: i64, resource_type_id: i64, resource_id: i64) -> Result<(), DataError> {
    sqlx::query("DELETE FROM resource WHERE realm_id = $1 AND resource_type_id = $2 AND id = $3")
        .bind(realm_id)
        .bind(resource_type_id)
        .bind(resource_id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
    Ok(())
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResourceExportRow {
    pub id: i64,
    pub attributes: Json,
    pub geometry_ewkt: Option<String>,
    pub external_id: Option<String>,
}

/// Reads every resource of a type back out in manifest export form (§6.5):
/// attributes as-is, geometry as EWKT text, and the external id used to
/// reference the resource from `acl` entries, if one was ever attached.
pub async fn list_for_type_export(
    pool: &PgPool,
    realm_id: i64,
    resource_type_id: i64,
) -> Result<Vec<ResourceExportRow>, DataError> {
    sqlx::query_as::<_, ResourceExportRow>(
        "SELECT r.id, r.attributes, ST_AsEWKT(r.geometry) AS geometry_ewkt, e.external_id
         FROM resource r
         LEFT JOIN external_ids e ON e.realm_id = r.realm_id
             AND e.resource_type_id = r.resource_type_id
             AND e.resource_id = r.id
         WHERE r.realm_id = $1 AND r.resource_type_id = $2",
    )
    .bind(realm_id)
    .bind(resource_type_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}

pub async fn find_by_id(
    pool: &PgPool,
    realm_id: i64,
    resource_type_id: i64,
    resource_id: i64,
) -> Result<Option<ResourceRow>, DataError> {
    sqlx::query_as::<_, ResourceRow>(
        "SELECT id, realm_id, resource_type_id, attributes FROM resource
         WHERE realm_id = $1 AND resource_type_id = $2 AND id = $3",
    )
    .bind(realm_id)
    .bind(resource_type_id)
    .bind(resource_id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}

pub async fn attach_external_id(
    pool: &PgPool,
    realm_id: i64,
    resource_type_id: i64,
    resource_id: i64,
    external_id: &str,
) -> Result<(), DataError> {
    sqlx::query(
        "INSERT INTO external_ids (resource_id, realm_id, resource_type_id, external_id)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (realm_id, resource_type_id, external_id) DO UPDATE SET resource_id = EXCLUDED.resource_id",
    )
    .bind(resource_id)
    .bind(realm_id)
    .bind(resource_type_id)
    .bind(external_id)
    .execute(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)?;
    Ok(())
}

/// Batch-resolve external ids to internal resource ids, used by the
/// orchestrator on a cache miss (§4.7 step 4).
pub async fn resolve_external_ids(
    pool: &PgPool,
    realm_id: i64,
    resource_type_id: i64,
    external_ids: &[String],
) -> Result<Vec<(String, Option<i64>)>, DataError> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT external_id, resource_id FROM external_ids
         WHERE realm_id = $1 AND resource_type_id = $2 AND external_id = ANY($3)",
    )
    .bind(realm_id)
    .bind(resource_type_id)
    .bind(external_ids)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)?;

    let found: std::collections::HashMap<_, _> = rows.into_iter().collect();
    Ok(external_ids
        .iter()
        .map(|ext| (ext.clone(), found.get(ext).copied()))
        .collect())
}

/// Maps internal resource ids back to external ids in chunks of 30k to
/// avoid parameter-list explosion (§4.7 step 5d).
pub const EXTERNAL_ID_CHUNK_SIZE: usize = 30_000;

pub async fn external_ids_for_resources(
    pool: &PgPool,
    realm_id: i64,
    resource_type_id: i64,
    resource_ids: &[i64],
) -> Result<Vec<String>, DataError> {
    let mut out = Vec::with_capacity(resource_ids.len());
    for chunk in resource_ids.chunks(EXTERNAL_ID_CHUNK_SIZE) {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT external_id FROM external_ids
             WHERE realm_id = $1 AND resource_type_id = $2 AND resource_id = ANY($3)",
        )
        .bind(realm_id)
        .bind(resource_type_id)
        .bind(chunk)
        .fetch_all(pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
        out.extend(rows.into_iter().map(|(id,)| id));
    }
    Ok(out)
}
