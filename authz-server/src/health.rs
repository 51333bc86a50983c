//! Concrete [`HealthIndicator`]s wired into the boot sequence's `/health`
//! router. The cache backend has no indicator of its own — §7's
//! "Upstream-unavailable" degrades Redis to direct database reads rather
//! than failing the request path, so a cache outage is not a liveness fact.

use sqlx::PgPool;

use authz_core::health::{HealthIndicator, HealthStatus};

pub struct PostgresHealthIndicator {
    pool: PgPool,
}

impl PostgresHealthIndicator {
    pub fn new(pool: PgPool) -> Self {
        PostgresHealthIndicator { pool }
    }
}

impl HealthIndicator for PostgresHealthIndicator {
    fn name(&self) -> &str {
        "postgres"
    }

    fn check(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = HealthStatus> + Send + '_>> {
        Box::pin(async move {
            match sqlx::query("SELECT 1").execute(&self.pool).await {
                Ok(_) => HealthStatus::Up,
                Err(err) => HealthStatus::Down(err.to_string()),
            }
        })
    }
}
