//! The declarative manifest surface (§6, §6.5): apply a document wholesale
//! or export a realm's current state back out in the same shape.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;

use authz_core::{AppError, AppResult};
use authz_engine::{apply_manifest, export_manifest, ManifestDocument, ManifestMode};

use crate::state::AppState;

pub async fn apply_manifest_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    Json(doc): Json<ManifestDocument>,
) -> AppResult<Json<serde_json::Value>> {
    let mode = match params.get("mode") {
        Some(raw) => raw.parse::<ManifestMode>()?,
        None => ManifestMode::Update,
    };
    let report = apply_manifest(&state.deps.pool, &state.deps.cache, doc, mode).await?;
    Ok(Json(serde_json::to_value(report).map_err(|e| AppError::Internal(e.to_string()))?))
}

pub async fn export_manifest_handler(
    State(state): State<AppState>,
    Path(realm_name): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let doc = export_manifest(&state.deps.pool, &realm_name).await?;
    Ok(Json(doc))
}
