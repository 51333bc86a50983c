use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use authz_core::AppConfig;

use crate::error::{DataError, SqlxErrorExt};

/// Build the connection pool from [`AppConfig`]'s pool settings (§2.1, §5).
pub async fn connect_pool(config: &AppConfig) -> Result<PgPool, DataError> {
    PgPoolOptions::new()
        .max_connections(config.pool.max_connections())
        .acquire_timeout(config.pool.timeout)
        .idle_timeout(Some(config.pool.recycle))
        .test_before_acquire(config.pool.pre_ping)
        .connect(&config.database_url)
        .await
        .map_err(SqlxErrorExt::into_data_error)
}

/// Apply embedded migrations (schema, partition-manager functions, the
/// compiled-sql trigger and the decision stored routines).
pub async fn migrate(pool: &PgPool) -> Result<(), DataError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DataError::database(e))
}

/// How long the caller should wait before giving up on an individual
/// request-level database acquisition when the pool is saturated — distinct
/// from the pool's own acquire timeout, used by the orchestrator's
/// per-item connection budget (§5 "Concurrency").
pub const PER_ITEM_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);
