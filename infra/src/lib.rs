//! # Infrastructure Layer
//!
//! This crate implements the infrastructure layer for SessionVault: the
//! MySQL-backed token store shared by multi-instance deployments, plus
//! connection pool management. The in-memory store for single-instance
//! use lives in `sv_core`; both satisfy the same `TokenStore` contract.

// Re-export core types for convenience
pub use sv_core::errors::*;

/// Database module - MySQL implementations using SQLx
pub mod database;

pub use database::{DatabasePool, MySqlTokenStore};

use sv_shared::config::AppConfig;

/// Infrastructure-specific error types
#[derive(Debug, thiserror::Error)]
pub enum InfrastructureError {
    /// Database connection error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Initialize the persistent token store from environment configuration
///
/// Loads `.env` if present, builds the connection pool, runs pending
/// migrations, and returns a ready store.
pub async fn initialize() -> Result<MySqlTokenStore, InfrastructureError> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();

    tracing::info!("Initializing token store infrastructure");

    let pool = DatabasePool::new(config.database).await?;
    pool.run_migrations().await?;

    Ok(MySqlTokenStore::new(
        pool.get_pool().clone(),
        config.tokens.lock_wait_ms,
    ))
}
