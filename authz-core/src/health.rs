//! Liveness/readiness probes.
//!
//! | Path | Description |
//! |---|---|
//! | `GET /health` | Aggregated status — 200 if all checks are up, 503 otherwise |
//! | `GET /health/live` | Liveness probe — always 200 |
//! | `GET /health/ready` | Readiness probe — 200 if all checks pass |

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

/// A named health check (e.g. "postgres", "redis").
pub trait HealthIndicator: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn check(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = HealthStatus> + Send + '_>>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub checks: Vec<HealthCheck>,
    pub uptime_seconds: u64,
}

struct HealthState {
    checks: Vec<Box<dyn HealthIndicator>>,
    start_time: Instant,
}

/// Build the `/health`, `/health/live`, `/health/ready` router from a set of
/// indicators. Mounted at the application's root router by `authz-http`.
pub fn health_router(checks: Vec<Box<dyn HealthIndicator>>) -> Router {
    let state = Arc::new(HealthState {
        checks,
        start_time: Instant::now(),
    });
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(health_handler))
        .with_state(state)
}

async fn aggregate(state: &HealthState) -> HealthResponse {
    let mut checks = Vec::with_capacity(state.checks.len());
    let mut all_up = true;
    for indicator in &state.checks {
        let (status, reason) = match indicator.check().await {
            HealthStatus::Up => ("UP", None),
            HealthStatus::Down(reason) => {
                all_up = false;
                ("DOWN", Some(reason))
            }
        };
        checks.push(HealthCheck {
            name: indicator.name().to_string(),
            status,
            reason,
        });
    }
    HealthResponse {
        status: if all_up { "UP" } else { "DOWN" },
        checks,
        uptime_seconds: state.start_time.elapsed().as_secs(),
    }
}

async fn health_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let response = aggregate(&state).await;
    let code = if response.status == "UP" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysUp;
    impl HealthIndicator for AlwaysUp {
        fn name(&self) -> &str {
            "always-up"
        }
        fn check(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = HealthStatus> + Send + '_>> {
            Box::pin(async { HealthStatus::Up })
        }
    }

    struct AlwaysDown;
    impl HealthIndicator for AlwaysDown {
        fn name(&self) -> &str {
            "always-down"
        }
        fn check(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = HealthStatus> + Send + '_>> {
            Box::pin(async { HealthStatus::Down("unreachable".into()) })
        }
    }

    #[tokio::test]
    async fn aggregate_is_up_when_all_checks_pass() {
        let state = HealthState {
            checks: vec![Box::new(AlwaysUp)],
            start_time: Instant::now(),
        };
        let resp = aggregate(&state).await;
        assert_eq!(resp.status, "UP");
    }

    #[tokio::test]
    async fn aggregate_is_down_when_any_check_fails() {
        let state = HealthState {
            checks: vec![Box::new(AlwaysUp), Box::new(AlwaysDown)],
            start_time: Instant::now(),
        };
        let resp = aggregate(&state).await;
        assert_eq!(resp.status, "DOWN");
        assert_eq!(resp.checks.len(), 2);
    }
}
