//! Configuration for the rotation service

use chrono::Duration;
use sv_shared::config::TokenConfig;

use crate::domain::entities::token::DEFAULT_TOKEN_TTL_DAYS;

/// Configuration for the rotation service
#[derive(Debug, Clone)]
pub struct RotationConfig {
    /// Refresh token time-to-live in days
    pub ttl_days: i64,
    /// Length of generated raw secrets, in characters
    pub secret_length: usize,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            ttl_days: DEFAULT_TOKEN_TTL_DAYS,
            secret_length: 48,
        }
    }
}

impl RotationConfig {
    /// Token time-to-live as a duration
    pub fn token_ttl(&self) -> Duration {
        Duration::days(self.ttl_days)
    }
}

impl From<&TokenConfig> for RotationConfig {
    fn from(config: &TokenConfig) -> Self {
        Self {
            ttl_days: config.ttl_days,
            secret_length: config.secret_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RotationConfig::default();
        assert_eq!(config.ttl_days, 30);
        assert_eq!(config.secret_length, 48);
        assert_eq!(config.token_ttl(), Duration::days(30));
    }

    #[test]
    fn test_from_shared_config() {
        let shared = TokenConfig::default().with_ttl_days(7);
        let config = RotationConfig::from(&shared);

        assert_eq!(config.ttl_days, 7);
        assert_eq!(config.secret_length, shared.secret_length);
    }
}
