//! Boot binary: environment configuration, tracing, pool/cache construction,
//! and the `serve` / `migrate` / `manifest-apply` / `manifest-export`
//! entry points (§2.1, §6 environment configuration table).

mod cli;
mod health;

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use authz_audit::AuditQueue;
use authz_cache::Cache;
use authz_core::health::HealthIndicator;
use authz_core::AppConfig;
use authz_engine::{CachingPrincipalResolver, EngineDeps};
use authz_security::TokenResolver;
use authz_sync::{IdpSyncScheduler, KeycloakAdapter};

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    authz_core::tracing_setup::init_tracing(config.log_format);

    let cli = Cli::parse();
    match cli.command {
        Command::Serve => serve(config).await,
        Command::Migrate => migrate(&config).await,
        Command::ManifestApply { path, mode } => manifest_apply(&config, &path, &mode).await,
        Command::ManifestExport { realm } => manifest_export(&config, &realm).await,
    }
}

async fn migrate(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pool = authz_store::pool::connect_pool(config).await?;
    authz_store::pool::migrate(&pool).await?;
    tracing::info!("migrations applied");
    Ok(())
}

async fn manifest_apply(config: &AppConfig, path: &str, mode: &str) -> Result<(), Box<dyn std::error::Error>> {
    let pool = authz_store::pool::connect_pool(config).await?;
    let cache = build_cache(config).await;
    let raw = tokio::fs::read_to_string(path).await?;
    let doc: authz_engine::ManifestDocument = serde_json::from_str(&raw)?;
    let mode: authz_engine::ManifestMode = mode.parse()?;
    let report = authz_engine::apply_manifest(&pool, &cache, doc, mode).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn manifest_export(config: &AppConfig, realm: &str) -> Result<(), Box<dyn std::error::Error>> {
    let pool = authz_store::pool::connect_pool(config).await?;
    let doc = authz_engine::export_manifest(&pool, realm).await?;
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

async fn build_cache(config: &AppConfig) -> Cache {
    let Some(redis_url) = &config.redis_url else {
        return Cache::in_memory();
    };
    match authz_cache::RedisStore::connect(redis_url).await {
        Ok(store) => Cache::new(Arc::new(store)),
        Err(err) => {
            tracing::warn!(error = %err, "failed to connect to redis at boot, falling back to in-memory cache");
            Cache::in_memory()
        }
    }
}

async fn serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pool = authz_store::pool::connect_pool(&config).await?;
    authz_store::pool::migrate(&pool).await?;

    let cache = build_cache(&config).await;
    let redis_conn = match &config.redis_url {
        Some(url) => match redis::Client::open(url.as_str()) {
            Ok(client) => client.get_connection_manager().await.ok(),
            Err(_) => None,
        },
        None => None,
    };

    let audit = AuditQueue::new(redis_conn.clone(), config.audit_queue_name.clone(), pool.clone());
    let deps = EngineDeps::new(pool.clone(), cache.clone(), audit);

    let token_resolver = TokenResolver::new(config.jwt_secret_key.clone(), &config.jwt_algorithm)?;
    let principal_resolver = Arc::new(CachingPrincipalResolver::new(pool.clone(), cache.clone()));
    let state = authz_http::AppState::new(deps, token_resolver, principal_resolver);

    let shutdown = CancellationToken::new();

    if !config.testing {
        if let Some(redis_conn) = redis_conn {
            let drainer_pool = pool.clone();
            let queue_name = config.audit_queue_name.clone();
            let interval = config.audit_drain_interval;
            let drainer_shutdown = shutdown.clone();
            tokio::spawn(authz_audit::drainer::run(drainer_pool, redis_conn, queue_name, interval, drainer_shutdown));
        }

        if config.enable_scheduler {
            let scheduler = IdpSyncScheduler::new(
                pool.clone(),
                cache.clone(),
                Arc::new(KeycloakAdapter::new()),
                std::time::Duration::from_secs(config.idp_sync_poll_secs),
            );
            let scheduler_shutdown = shutdown.clone();
            tokio::spawn(async move { scheduler.run(scheduler_shutdown).await });
        }
    }

    let health_checks: Vec<Box<dyn HealthIndicator>> = vec![Box::new(health::PostgresHealthIndicator::new(pool))];
    let app = authz_http::build_router(state, health_checks);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "authz-server listening");

    let serve_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            serve_shutdown.cancel();
        })
        .await?;

    Ok(())
}
