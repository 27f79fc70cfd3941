//! Periodic cleanup of expired tokens and empty families.
//!
//! The sweep runs outside the request path. A failed cycle is logged and
//! retried on the next tick; it never affects authentication.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sv_shared::config::TokenConfig;
use tracing::{error, info, warn};

use crate::errors::DomainError;
use crate::repositories::token::TokenStore;

/// Configuration for the cleanup job
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// How often to run cleanup (in seconds)
    pub interval_seconds: u64,
    /// Grace period after expiry before deletion (in days)
    pub retention_grace_days: i64,
    /// Whether to enable automatic cleanup
    pub enabled: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 86_400, // Run daily
            retention_grace_days: 7,
            enabled: true,
        }
    }
}

impl From<&TokenConfig> for CleanupConfig {
    fn from(config: &TokenConfig) -> Self {
        Self {
            interval_seconds: config.cleanup_interval_seconds,
            retention_grace_days: config.retention_grace_days,
            enabled: true,
        }
    }
}

/// Service for sweeping expired tokens and empty families
pub struct CleanupService<S: TokenStore + 'static> {
    store: Arc<S>,
    config: CleanupConfig,
}

impl<S: TokenStore> CleanupService<S> {
    /// Create a new cleanup service
    pub fn new(store: Arc<S>, config: CleanupConfig) -> Self {
        Self { store, config }
    }

    /// Run a single cleanup cycle
    ///
    /// Deletes tokens whose expiry is older than the retention grace
    /// window, then deletes families left with zero tokens. Non-expired
    /// and active rows are never touched.
    ///
    /// # Returns
    /// * `Ok(CleanupResult)` - Summary of the cycle, including per-step errors
    /// * `Err(DomainError)` - Not produced by the default steps; reserved
    ///   for store-level preconditions
    pub async fn run_cleanup(&self) -> Result<CleanupResult, DomainError> {
        if !self.config.enabled {
            return Ok(CleanupResult::default());
        }

        info!("Starting token cleanup cycle");

        let mut result = CleanupResult::default();
        let cutoff = Utc::now() - Duration::days(self.config.retention_grace_days);

        match self.store.delete_expired_tokens(cutoff).await {
            Ok(count) => {
                result.expired_tokens_deleted = count;
                info!("Deleted {} expired refresh tokens", count);
            }
            Err(e) => {
                error!("Failed to delete expired tokens: {}", e);
                result.errors.push(format!("Token cleanup error: {}", e));
            }
        }

        match self.store.delete_empty_families().await {
            Ok(count) => {
                result.empty_families_deleted = count;
                info!("Deleted {} empty token families", count);
            }
            Err(e) => {
                error!("Failed to delete empty families: {}", e);
                result.errors.push(format!("Family cleanup error: {}", e));
            }
        }

        info!(
            "Token cleanup completed - Tokens: {}, Families: {}",
            result.expired_tokens_deleted, result.empty_families_deleted
        );

        Ok(result)
    }

    /// Start the cleanup job as a background task
    ///
    /// Spawns a tokio task that runs cleanup at the configured interval.
    /// A failing cycle is retried on the next tick.
    pub fn start_background_task(self: Arc<Self>) {
        if !self.config.enabled {
            warn!("Token cleanup job is disabled");
            return;
        }

        let interval = std::time::Duration::from_secs(self.config.interval_seconds);

        tokio::spawn(async move {
            info!(
                "Token cleanup job started - will run every {} seconds",
                self.config.interval_seconds
            );

            let mut interval_timer = tokio::time::interval(interval);

            loop {
                interval_timer.tick().await;

                match self.run_cleanup().await {
                    Ok(result) => {
                        if !result.errors.is_empty() {
                            warn!("Cleanup completed with errors: {:?}", result.errors);
                        }
                    }
                    Err(e) => {
                        error!("Token cleanup cycle failed: {}", e);
                    }
                }
            }
        });
    }
}

/// Result of a cleanup cycle
#[derive(Debug, Default)]
pub struct CleanupResult {
    /// Number of expired refresh tokens deleted
    pub expired_tokens_deleted: usize,
    /// Number of empty families deleted
    pub empty_families_deleted: usize,
    /// Any errors encountered during cleanup
    pub errors: Vec<String>,
}

impl CleanupResult {
    /// Check if the cleanup was successful (no errors)
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get total number of rows cleaned up
    pub fn total_cleaned(&self) -> usize {
        self.expired_tokens_deleted + self.empty_families_deleted
    }
}
