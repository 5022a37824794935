//! Database connection management
//!
//! Builds the connection pool and bootstraps the schema.

pub mod queries;
pub mod service;

pub use service::{PgRefreshTokenStore, PgUserStore};

use crate::config::DatabaseConfig;
use crate::error::AppError;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::{debug, info};

/// Create a pool from settings and verify one connection
pub async fn init_pool(config: &DatabaseConfig) -> Result<Pool, AppError> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.user = Some(config.user.clone());
    cfg.password = Some(config.password.clone());
    cfg.dbname = Some(config.database.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(deadpool_postgres::PoolConfig::new(config.max_pool_size));

    let pool = if config.require_tls {
        let certs = rustls_native_certs::load_native_certs();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in certs.certs {
            root_store.add(cert).ok();
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

        cfg.create_pool(Some(Runtime::Tokio1), tls)
            .map_err(|e| AppError::Config(format!("Failed to create TLS pool: {}", e)))?
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| AppError::Config(format!("Failed to create pool: {}", e)))?
    };

    // Simple test query to verify connection works
    let client = pool.get().await?;
    client.query_one("SELECT 1", &[]).await?;

    info!(
        host = %config.host,
        database = %config.database,
        tls = config.require_tls,
        "Database connection successful"
    );
    Ok(pool)
}

/// Create tables if they don't exist
pub async fn create_tables(pool: &Pool) -> Result<(), AppError> {
    let client = pool.get().await?;

    client.batch_execute(queries::CREATE_USERS_TABLE).await?;
    client.batch_execute(queries::CREATE_REFRESH_TOKENS_TABLE).await?;

    debug!("Database tables initialized");
    Ok(())
}
