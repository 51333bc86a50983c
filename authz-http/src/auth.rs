//! Bearer-token resolution into a [`Principal`] (§4.9), run per-request
//! against whichever realm the request body names — there is no single
//! process-wide realm, so this cannot be a generic extractor.

use axum::http::HeaderMap;

use authz_cache::RealmMap;
use authz_core::AppError;
use authz_security::Principal;

use crate::state::AppState;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

pub async fn resolve(state: &AppState, headers: &HeaderMap, realm_name: &str) -> Result<(RealmMap, Principal), AppError> {
    let map = authz_engine::realm::resolve_realm(&state.deps.pool, &state.deps.cache, realm_name).await?;
    let Some(token) = bearer_token(headers) else {
        return Ok((map, Principal::anonymous()));
    };

    let claims = match state.token_resolver.decode_claims(token, &map) {
        Ok(c) => c,
        Err(err) => {
            tracing::debug!(error = %err, "token verification failed, using anonymous principal");
            return Ok((map, Principal::anonymous()));
        }
    };

    // §4.9: a `realm` claim in the token overrides the hint for principal
    // lookup. Verification material was already picked from the hint realm
    // above; re-resolving here only changes which realm's principal table
    // and role names the claims are matched against.
    let (lookup_map, effective_realm_id) = match &claims.realm {
        Some(claim_realm) if claim_realm != realm_name => {
            match authz_engine::realm::resolve_realm(&state.deps.pool, &state.deps.cache, claim_realm).await {
                Ok(override_map) => {
                    let id = override_map.id;
                    (override_map, id)
                }
                Err(err) => {
                    tracing::debug!(error = %err, realm = %claim_realm, "token realm claim did not resolve, falling back to hint realm");
                    (map.clone(), map.id)
                }
            }
        }
        _ => (map.clone(), map.id),
    };

    let principal = state
        .token_resolver
        .principal_from_claims(claims, &lookup_map, effective_realm_id, state.principal_resolver.as_ref())
        .await;
    Ok((map, principal))
}
