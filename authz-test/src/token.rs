//! HS256 bearer tokens signed with [`fixtures::TEST_JWT_SECRET`], the same
//! secret `fixtures::test_state` wires into the `TokenResolver` — lets tests
//! exercise `/check-access` et al. as an authenticated principal without a
//! real identity provider.

use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value as Json};

use crate::fixtures::TEST_JWT_SECRET;

/// Mints a token whose `sub` is the principal's numeric id, optionally
/// merged with extra claims (`realm_access.roles`, `groups`, …) the caller
/// wants `TokenResolver::resolve` to pick up on top of the stored role set.
pub fn mint_test_token(principal_id: i64, extra_claims: Option<Json>) -> String {
    let mut claims = json!({ "sub": principal_id.to_string() });
    if let Some(Json::Object(extra)) = extra_claims {
        if let Json::Object(map) = &mut claims {
            map.extend(extra);
        }
    }
    encode(&Header::default(), &claims, &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()))
        .expect("signing a test token with a fixed HS256 secret cannot fail")
}
