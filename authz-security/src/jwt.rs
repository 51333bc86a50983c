//! Bearer token validation and claims extraction (§4.9).
//!
//! This module is deliberately database-free: it decodes and validates a
//! token against a realm's verification material (or the process-wide
//! default) and extracts the subject/role claims. Mapping the decoded
//! claims to a stored [`Principal`] is the caller's job, done through the
//! [`PrincipalResolver`] trait so this crate never depends on `authz-store`.

use std::future::Future;
use std::pin::Pin;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value as Json;

use authz_cache::RealmMap;

use crate::error::SecurityError;
use crate::principal::Principal;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Bridges a decoded identity (realm id, numeric id or username) to a
/// stored principal record, cache-first. Implemented by `authz-engine`
/// against `authz-cache` + `authz-store` so this crate stays free of a
/// database dependency.
pub trait PrincipalResolver: Send + Sync {
    fn resolve_by_id(&self, principal_id: i64) -> BoxFuture<'_, Option<ResolvedPrincipal>>;
    fn resolve_by_username(&self, realm_id: i64, username: &str) -> BoxFuture<'_, Option<ResolvedPrincipal>>;
}

/// What the resolver trait hands back: the stored principal's identity,
/// attributes, and the role ids it owns in the database (§4.9 "look up the
/// principal ... return a populated principal object").
#[derive(Debug, Clone)]
pub struct ResolvedPrincipal {
    pub id: i64,
    pub username: String,
    pub realm_id: i64,
    pub attributes: Json,
    pub role_ids: Vec<i64>,
}

/// Claims extracted from a validated token, before principal lookup.
#[derive(Debug, Clone)]
pub struct DecodedClaims {
    /// `sub`, still in its raw string form — parsed as an id or a username
    /// by [`TokenResolver::resolve`].
    pub subject: String,
    pub preferred_username: Option<String>,
    /// Overrides the caller-supplied realm hint when present (§4.9).
    pub realm: Option<String>,
    /// Merged from `realm_access.roles`, top-level `roles`, and `groups`
    /// (leading `/` stripped) — role *names*, resolved to ids by the caller
    /// against the realm map.
    pub role_names: Vec<String>,
}

fn extract_string_array(claims: &Json, path: &[&str]) -> Vec<String> {
    let mut node = claims;
    for segment in path {
        match node.get(segment) {
            Some(v) => node = v,
            None => return Vec::new(),
        }
    }
    node.as_array()
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn decode_claims_from_json(claims: Json) -> DecodedClaims {
    let subject = claims.get("sub").and_then(Json::as_str).unwrap_or_default().to_string();
    let preferred_username = claims
        .get("preferred_username")
        .and_then(Json::as_str)
        .map(str::to_string);
    let realm = claims.get("realm").and_then(Json::as_str).map(str::to_string);

    let mut role_names = extract_string_array(&claims, &["realm_access", "roles"]);
    role_names.extend(extract_string_array(&claims, &["roles"]));
    let groups = extract_string_array(&claims, &["groups"])
        .into_iter()
        .map(|g| g.strip_prefix('/').map(str::to_string).unwrap_or(g));
    role_names.extend(groups);
    role_names.sort();
    role_names.dedup();

    DecodedClaims { subject, preferred_username, realm, role_names }
}

/// Wraps a realm's bare base64 public-key body in PEM framing, as required
/// by `jsonwebtoken`'s RSA decoding key constructor (§4.9 "the stored
/// material is the bare base64 body").
fn pem_wrap(base64_body: &str) -> String {
    let mut pem = String::from("-----BEGIN PUBLIC KEY-----\n");
    for chunk in base64_body.as_bytes().chunks(64) {
        pem.push_str(std::str::from_utf8(chunk).unwrap_or(""));
        pem.push('\n');
    }
    pem.push_str("-----END PUBLIC KEY-----\n");
    pem
}

fn parse_algorithm(name: &str) -> Result<Algorithm, SecurityError> {
    name.parse::<Algorithm>()
        .map_err(|_| SecurityError::InvalidToken(format!("unsupported JWT algorithm: {name}")))
}

/// Validates bearer tokens against per-realm or process-default material and
/// maps the result to a [`Principal`]. Never errors outward — every failure
/// path (§4.9 "On any failure, return the anonymous principal") collapses to
/// [`Principal::anonymous`] inside [`TokenResolver::resolve`]; the lower-level
/// [`TokenResolver::decode_claims`] is exposed separately for callers (and
/// tests) that want to observe the distinction.
pub struct TokenResolver {
    default_secret: String,
    default_algorithm: Algorithm,
}

impl TokenResolver {
    pub fn new(default_secret: impl Into<String>, default_algorithm: &str) -> Result<Self, SecurityError> {
        Ok(TokenResolver {
            default_secret: default_secret.into(),
            default_algorithm: parse_algorithm(default_algorithm)?,
        })
    }

    /// Decode and validate `token` against `realm`'s verification material,
    /// falling back to the process-wide default (§4.9 "Choose verification
    /// key and algorithm"). No audience check is performed.
    pub fn decode_claims(&self, token: &str, realm: &RealmMap) -> Result<DecodedClaims, SecurityError> {
        let (key, algorithm) = match (&realm.public_key, &realm.algorithm) {
            (Some(pem_body), Some(alg)) => {
                let algorithm = parse_algorithm(alg)?;
                let key = DecodingKey::from_rsa_pem(pem_wrap(pem_body).as_bytes())
                    .map_err(|e| SecurityError::InvalidToken(format!("invalid realm public key: {e}")))?;
                (key, algorithm)
            }
            _ => (DecodingKey::from_secret(self.default_secret.as_bytes()), self.default_algorithm),
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;

        let data = decode::<Json>(token, &key, &validation)
            .map_err(|e| SecurityError::InvalidToken(e.to_string()))?;
        Ok(decode_claims_from_json(data.claims))
    }

    /// Full resolution path (§4.9): decode against `realm`, resolve the
    /// subject against `resolver`, and merge role claims. `realm_hint_id` is
    /// the realm id the caller resolved from the hint name; if the token
    /// carries a different `realm` claim, the caller is expected to have
    /// already re-resolved `realm`/`effective_realm_id` to that claim's
    /// realm (see [`crate::jwt`] module docs and `authz-http::auth::resolve`)
    /// before calling [`resolve`] — `realm` itself was only used to pick
    /// verification material during [`decode_claims`], so a claim-level
    /// override does not re-verify the signature against a second realm's
    /// key, only the principal lookup that follows it.
    pub async fn resolve(
        &self,
        token: Option<&str>,
        realm: &RealmMap,
        effective_realm_id: i64,
        resolver: &dyn PrincipalResolver,
    ) -> Principal {
        let Some(token) = token else {
            return Principal::anonymous();
        };

        let claims = match self.decode_claims(token, realm) {
            Ok(c) => c,
            Err(err) => {
                tracing::debug!(error = %err, "token verification failed, using anonymous principal");
                return Principal::anonymous();
            }
        };

        self.principal_from_claims(claims, realm, effective_realm_id, resolver).await
    }

    /// The post-decode half of [`resolve`]: subject lookup and role-claim
    /// merge against an already-decoded [`DecodedClaims`]. Split out so a
    /// caller that needs to re-resolve the realm map from `claims.realm`
    /// (§4.9 "a `realm` claim ... overrides the hint") can decode once and
    /// then resolve the principal against whichever realm map ends up
    /// effective, without re-verifying the token.
    pub async fn principal_from_claims(
        &self,
        claims: DecodedClaims,
        realm: &RealmMap,
        effective_realm_id: i64,
        resolver: &dyn PrincipalResolver,
    ) -> Principal {
        let resolved = if let Ok(id) = claims.subject.parse::<i64>() {
            resolver.resolve_by_id(id).await
        } else {
            let username = claims.preferred_username.as_deref().unwrap_or(&claims.subject);
            resolver.resolve_by_username(effective_realm_id, username).await
        };

        let Some(resolved) = resolved else {
            tracing::debug!(subject = %claims.subject, "token subject did not resolve to a principal");
            return Principal::anonymous();
        };

        let mut role_ids = resolved.role_ids.clone();
        for name in &claims.role_names {
            if let Some(&id) = realm.roles.get(name) {
                if !role_ids.contains(&id) {
                    role_ids.push(id);
                }
            }
        }

        Principal {
            id: resolved.id,
            username: resolved.username,
            realm_id: resolved.realm_id,
            attributes: resolved.attributes,
            role_ids,
            is_anonymous: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::collections::HashMap;

    fn sample_realm() -> RealmMap {
        RealmMap {
            id: 1,
            public_key: None,
            algorithm: None,
            actions: HashMap::new(),
            types: HashMap::new(),
            type_public: HashMap::new(),
            roles: HashMap::from([("viewer".to_string(), 42)]),
        }
    }

    fn sign(claims: &Json, secret: &str) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn decodes_numeric_subject_and_merges_role_sources() {
        let resolver = TokenResolver::new("dev-secret", "HS256").unwrap();
        let token = sign(
            &json!({
                "sub": "7",
                "realm_access": {"roles": ["viewer"]},
                "roles": ["extra"],
                "groups": ["/teams/ops"],
            }),
            "dev-secret",
        );
        let claims = resolver.decode_claims(&token, &sample_realm()).unwrap();
        assert_eq!(claims.subject, "7");
        assert!(claims.role_names.contains(&"viewer".to_string()));
        assert!(claims.role_names.contains(&"extra".to_string()));
        assert!(claims.role_names.contains(&"ops".to_string()));
    }

    #[test]
    fn wrong_secret_is_invalid_token() {
        let resolver = TokenResolver::new("dev-secret", "HS256").unwrap();
        let token = sign(&json!({"sub": "7"}), "other-secret");
        assert!(resolver.decode_claims(&token, &sample_realm()).is_err());
    }

    #[test]
    fn realm_claim_is_captured_for_override() {
        let resolver = TokenResolver::new("dev-secret", "HS256").unwrap();
        let token = sign(&json!({"sub": "7", "realm": "other-realm"}), "dev-secret");
        let claims = resolver.decode_claims(&token, &sample_realm()).unwrap();
        assert_eq!(claims.realm.as_deref(), Some("other-realm"));
    }

    struct NeverResolves;
    impl PrincipalResolver for NeverResolves {
        fn resolve_by_id(&self, _id: i64) -> BoxFuture<'_, Option<ResolvedPrincipal>> {
            Box::pin(async { None })
        }
        fn resolve_by_username(&self, _realm_id: i64, _username: &str) -> BoxFuture<'_, Option<ResolvedPrincipal>> {
            Box::pin(async { None })
        }
    }

    #[tokio::test]
    async fn missing_token_resolves_to_anonymous() {
        let resolver = TokenResolver::new("dev-secret", "HS256").unwrap();
        let principal = resolver.resolve(None, &sample_realm(), 1, &NeverResolves).await;
        assert!(principal.is_anonymous);
    }

    #[tokio::test]
    async fn unresolvable_subject_falls_back_to_anonymous() {
        let resolver = TokenResolver::new("dev-secret", "HS256").unwrap();
        let token = sign(&json!({"sub": "999"}), "dev-secret");
        let principal = resolver.resolve(Some(&token), &sample_realm(), 1, &NeverResolves).await;
        assert!(principal.is_anonymous);
    }

    #[tokio::test]
    async fn invalid_signature_falls_back_to_anonymous() {
        let resolver = TokenResolver::new("dev-secret", "HS256").unwrap();
        let token = sign(&json!({"sub": "7"}), "wrong-secret");
        let principal = resolver.resolve(Some(&token), &sample_realm(), 1, &NeverResolves).await;
        assert!(principal.is_anonymous);
    }
}
