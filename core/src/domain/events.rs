//! Security events published for external alerting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::token::RefreshToken;

/// Event published when a non-active refresh token is presented.
///
/// Carries enough context for an alerting pipeline to correlate the
/// incident; it never contains the raw secret or its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReuseAlert {
    /// User whose token chain was replayed
    pub user_id: Uuid,

    /// Device the family was bound to
    pub device_id: String,

    /// Family that was revoked in response
    pub family_id: Uuid,

    /// Token that triggered detection
    pub jti: Uuid,

    /// Timestamp of detection
    pub detected_at: DateTime<Utc>,
}

impl ReuseAlert {
    /// Builds an alert from the stored token that tripped detection
    pub fn for_token(token: &RefreshToken, detected_at: DateTime<Utc>) -> Self {
        Self {
            user_id: token.user_id,
            device_id: token.device_id.clone(),
            family_id: token.family_id,
            jti: token.jti,
            detected_at,
        }
    }

    /// Event type label for structured logging and storage
    pub fn event_type(&self) -> &'static str {
        "TOKEN_REUSE_DETECTED"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::family::TokenFamily;
    use chrono::Duration;

    #[test]
    fn test_alert_carries_token_context() {
        let now = Utc::now();
        let family = TokenFamily::new(Uuid::new_v4(), "device-1", now);
        let token = RefreshToken::new(&family, "hash".to_string(), Duration::days(30), now);

        let alert = ReuseAlert::for_token(&token, now);

        assert_eq!(alert.user_id, family.user_id);
        assert_eq!(alert.device_id, "device-1");
        assert_eq!(alert.family_id, family.family_id);
        assert_eq!(alert.jti, token.jti);
        assert_eq!(alert.event_type(), "TOKEN_REUSE_DETECTED");
    }

    #[test]
    fn test_alert_never_contains_token_hash() {
        let now = Utc::now();
        let family = TokenFamily::new(Uuid::new_v4(), "device-1", now);
        let token =
            RefreshToken::new(&family, "secret-hash-value".to_string(), Duration::days(30), now);

        let alert = ReuseAlert::for_token(&token, now);
        let json = serde_json::to_string(&alert).unwrap();

        assert!(!json.contains("secret-hash-value"));
    }
}
