//! Refresh token configuration

use serde::{Deserialize, Serialize};

/// Refresh token lifecycle configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    /// Refresh token time-to-live in days
    pub ttl_days: i64,

    /// Length of the generated raw token secret, in characters
    #[serde(default = "default_secret_length")]
    pub secret_length: usize,

    /// Maximum time to wait for the family lock during rotation, in milliseconds
    pub lock_wait_ms: u64,

    /// How often the cleanup job runs, in seconds
    pub cleanup_interval_seconds: u64,

    /// Grace period after token expiry before deletion, in days
    pub retention_grace_days: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ttl_days: 30,
            secret_length: default_secret_length(),
            lock_wait_ms: 150,
            cleanup_interval_seconds: 86_400, // Run daily
            retention_grace_days: 7,
        }
    }
}

impl TokenConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            ttl_days: read_env("TOKEN_TTL_DAYS", defaults.ttl_days),
            secret_length: read_env("TOKEN_SECRET_LENGTH", defaults.secret_length),
            lock_wait_ms: read_env("TOKEN_LOCK_WAIT_MS", defaults.lock_wait_ms),
            cleanup_interval_seconds: read_env(
                "TOKEN_CLEANUP_INTERVAL_SECONDS",
                defaults.cleanup_interval_seconds,
            ),
            retention_grace_days: read_env(
                "TOKEN_RETENTION_GRACE_DAYS",
                defaults.retention_grace_days,
            ),
        }
    }

    /// Set the token time-to-live in days
    pub fn with_ttl_days(mut self, days: i64) -> Self {
        self.ttl_days = days;
        self
    }

    /// Set the family lock wait in milliseconds
    pub fn with_lock_wait_ms(mut self, millis: u64) -> Self {
        self.lock_wait_ms = millis;
        self
    }

    /// Set the retention grace period in days
    pub fn with_retention_grace_days(mut self, days: i64) -> Self {
        self.retention_grace_days = days;
        self
    }
}

fn default_secret_length() -> usize {
    48
}

fn read_env<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_config_default() {
        let config = TokenConfig::default();
        assert_eq!(config.ttl_days, 30);
        assert_eq!(config.secret_length, 48);
        assert_eq!(config.lock_wait_ms, 150);
        assert_eq!(config.cleanup_interval_seconds, 86_400);
        assert_eq!(config.retention_grace_days, 7);
    }

    #[test]
    fn test_token_config_builder() {
        let config = TokenConfig::default()
            .with_ttl_days(14)
            .with_lock_wait_ms(500)
            .with_retention_grace_days(3);

        assert_eq!(config.ttl_days, 14);
        assert_eq!(config.lock_wait_ms, 500);
        assert_eq!(config.retention_grace_days, 3);
    }

    #[test]
    fn test_token_config_serialization() {
        let config = TokenConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: TokenConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.ttl_days, config.ttl_days);
        assert_eq!(deserialized.lock_wait_ms, config.lock_wait_ms);
    }
}
