use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use authz_core::AppResult;
use authz_engine::{check_access, get_permitted_actions};

use crate::auth;
use crate::dto::{
    AccessResultWire, CheckAccessWireRequest, PermittedActionsResultWire, PermittedActionsWireRequest,
};
use crate::state::AppState;

pub async fn check_access_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CheckAccessWireRequest>,
) -> AppResult<Json<Vec<AccessResultWire>>> {
    let request = body.into_domain();
    let (_, principal) = auth::resolve(&state, &headers, &request.realm_name).await?;
    let results = check_access(&state.deps, &principal, request).await?;
    Ok(Json(results.into_iter().map(AccessResultWire::from).collect()))
}

pub async fn get_permitted_actions_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PermittedActionsWireRequest>,
) -> AppResult<Json<Vec<PermittedActionsResultWire>>> {
    let request = body.into_domain();
    let (_, principal) = auth::resolve(&state, &headers, &request.realm_name).await?;
    let results = get_permitted_actions(&state.deps, &principal, request).await?;
    Ok(Json(results.into_iter().map(PermittedActionsResultWire::from).collect()))
}
