use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use authz_core::AppResult;
use authz_engine::get_authorization_conditions;

use crate::auth;
use crate::dto::{ConditionsWireRequest, ConditionsWireResponse};
use crate::state::AppState;

pub async fn get_authorization_conditions_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ConditionsWireRequest>,
) -> AppResult<Json<ConditionsWireResponse>> {
    let (_, principal) = auth::resolve(&state, &headers, &body.realm).await?;
    let result = get_authorization_conditions(
        &state.deps,
        &principal,
        &body.realm,
        body.role_names.as_deref(),
        &body.type_name,
        &body.action,
    )
    .await?;
    Ok(Json(result.into()))
}
