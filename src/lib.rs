//! Records API
//!
//! Multi-tenant record-management backend (accounts, payments, activity
//! logs) with a cache-aside layer between the request handlers and
//! PostgreSQL. The cache is never authoritative and never fails a request:
//! a dead backend degrades every read to the database.

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use api::AppState;
use config::CacheBackend;
use domain::cache::CacheStore;
use infrastructure::account::PostgresAccountRepository;
use infrastructure::activity::PostgresActivityRepository;
use infrastructure::cache::{
    CacheService, MemoryStore, MemoryStoreConfig, RedisStore, RedisStoreConfig,
};
use infrastructure::payment::PostgresPaymentRepository;
use infrastructure::services::{AccountService, ActivityService, PaymentService};

/// Create the application state with all services initialized
///
/// The composition root owns every lifecycle: it connects the cache store
/// and injects it into the services, so nothing else in the crate holds
/// module-level connection state.
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let store = create_cache_store(config).await;
    let cache = CacheService::new(store)
        .with_default_ttl(Duration::from_secs(config.cache.default_ttl_secs));

    info!("Connecting to PostgreSQL...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to PostgreSQL: {e}"))?;
    info!("PostgreSQL connection established");

    let accounts_repo = Arc::new(PostgresAccountRepository::new(pool.clone()));
    let payments_repo = Arc::new(PostgresPaymentRepository::new(pool.clone()));
    let activities_repo = Arc::new(PostgresActivityRepository::new(pool.clone()));

    accounts_repo.ensure_table().await?;
    payments_repo.ensure_table().await?;
    activities_repo.ensure_table().await?;

    let accounts = AccountService::new(accounts_repo.clone(), cache.clone());
    let payments = PaymentService::new(payments_repo, accounts_repo, cache.clone());
    let activities = ActivityService::new(activities_repo, cache.clone());

    Ok(AppState::new(accounts, payments, activities, cache, pool))
}

/// Connects the configured cache backend
///
/// An unreachable Redis is not fatal: the process starts with an in-memory
/// store instead, and requests keep working against the source of truth.
async fn create_cache_store(config: &AppConfig) -> Arc<dyn CacheStore> {
    match config.cache.backend {
        CacheBackend::Memory => {
            info!("Using in-memory cache store");
            Arc::new(MemoryStore::with_config(
                MemoryStoreConfig::default().with_max_capacity(config.cache.max_capacity),
            ))
        }
        CacheBackend::Redis => {
            let redis_config = RedisStoreConfig::new(config.cache.url.clone());
            match RedisStore::connect(redis_config).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    warn!(error = %e, "Redis unavailable, falling back to in-memory cache");
                    Arc::new(MemoryStore::with_config(
                        MemoryStoreConfig::default()
                            .with_max_capacity(config.cache.max_capacity),
                    ))
                }
            }
        }
    }
}
