use axum::response::{IntoResponse, Response};
use axum::Json;
use axum::http::StatusCode;

/// The single error type that crosses the HTTP boundary.
///
/// Every internal error (database, cache, JWT, DSL) converts into one of
/// these variants via `From`, and every variant maps to exactly one status
/// code. `ConditionEval` failures never reach this type — they are caught at
/// the point a compiled predicate is evaluated and folded into a non-match.
pub enum AppError {
    /// Unresolvable realm/type/action/role name. 400.
    UnknownEntity(String),
    /// Token signature or decode failure on an endpoint that requires auth. 401.
    TokenInvalid(String),
    /// Malformed request body, or malformed DSL rejected at write time. 400.
    BadRequest(String),
    /// Addressing a missing entity by id. 404.
    NotFound(String),
    /// Insert into a `(realm, type)` with no leaf partition. 500.
    PartitionMissing { realm: String, resource_type: String },
    /// Infrastructure fault: database, cache, or anything else unclassified. 500.
    Internal(String),
    Custom { status: StatusCode, body: serde_json::Value },
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": message.into() });
    (status, Json(body)).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Custom { status, body } => (status, Json(body)).into_response(),
            other => {
                let (status, message) = match other {
                    AppError::UnknownEntity(msg) => (StatusCode::BAD_REQUEST, msg),
                    AppError::TokenInvalid(msg) => (StatusCode::UNAUTHORIZED, msg),
                    AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
                    AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
                    AppError::PartitionMissing { realm, resource_type } => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("no partition for realm '{realm}' resource type '{resource_type}'"),
                    ),
                    AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
                    AppError::Custom { .. } => unreachable!(),
                };
                error_response(status, message)
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::UnknownEntity(msg) => write!(f, "unknown entity: {msg}"),
            AppError::TokenInvalid(msg) => write!(f, "token invalid: {msg}"),
            AppError::BadRequest(msg) => write!(f, "bad request: {msg}"),
            AppError::NotFound(msg) => write!(f, "not found: {msg}"),
            AppError::PartitionMissing { realm, resource_type } => {
                write!(f, "partition missing: realm={realm} type={resource_type}")
            }
            AppError::Internal(msg) => write!(f, "internal error: {msg}"),
            AppError::Custom { status, body } => write!(f, "custom error ({status}): {body}"),
        }
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Generate `From<E> for AppError` implementations for infrastructure error
/// types that always map to the same variant.
///
/// ```ignore
/// authz_core::map_error! {
///     sqlx::Error => Internal,
///     redis::RedisError => Internal,
/// }
/// ```
#[macro_export]
macro_rules! map_error {
    ( $( $err_ty:ty => $variant:ident ),* $(,)? ) => {
        $(
            impl From<$err_ty> for $crate::error::AppError {
                fn from(err: $err_ty) -> Self {
                    $crate::error::AppError::$variant(err.to_string())
                }
            }
        )*
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn error_parts(err: AppError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        (status, json)
    }

    #[tokio::test]
    async fn unknown_entity_is_400() {
        let (status, body) = error_parts(AppError::UnknownEntity("realm 'foo'".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "unknown entity: realm 'foo'");
    }

    #[tokio::test]
    async fn token_invalid_is_401() {
        let (status, _) = error_parts(AppError::TokenInvalid("bad signature".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn not_found_is_404() {
        let (status, _) = error_parts(AppError::NotFound("acl 7".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn partition_missing_is_500_with_context() {
        let (status, body) = error_parts(AppError::PartitionMissing {
            realm: "acme".into(),
            resource_type: "document".into(),
        })
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("acme"));
    }

    #[tokio::test]
    async fn custom_status_and_body_round_trip() {
        let custom = serde_json::json!({"detail": "teapot"});
        let (status, body) = error_parts(AppError::Custom {
            status: StatusCode::IM_A_TEAPOT,
            body: custom.clone(),
        })
        .await;
        assert_eq!(status, StatusCode::IM_A_TEAPOT);
        assert_eq!(body, custom);
    }

    #[test]
    fn display_formatting() {
        assert_eq!(
            AppError::BadRequest("x".into()).to_string(),
            "bad request: x"
        );
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let app_err: AppError = io_err.into();
        match app_err {
            AppError::Internal(msg) => assert!(msg.contains("file missing")),
            other => panic!("expected Internal, got {other}"),
        }
    }
}
