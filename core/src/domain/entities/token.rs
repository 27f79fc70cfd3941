//! Refresh token entity and its status state machine.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::family::TokenFamily;

/// Default refresh token time-to-live (30 days)
pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 30;

/// Lifecycle status of a refresh token.
///
/// Transitions are monotonic: `Active -> Rotated` when the token is
/// retired by a successful rotation (or superseded by a fresh issue on
/// its family), and `Active | Rotated -> Revoked` when the family is
/// revoked. `Rotated` and `Revoked` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Active,
    Rotated,
    Revoked,
}

impl TokenStatus {
    /// Convert to string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Rotated => "rotated",
            Self::Revoked => "revoked",
        }
    }

    /// Parse from string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "rotated" => Some(Self::Rotated),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }
}

/// Refresh token entity stored in the token store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    /// Unique identifier for the token
    pub jti: Uuid,

    /// Family this token belongs to
    pub family_id: Uuid,

    /// User this token belongs to
    pub user_id: Uuid,

    /// Device the token is bound to
    pub device_id: String,

    /// SHA-256 hash of the raw secret. The raw value is never stored.
    pub token_hash: String,

    /// Current lifecycle status
    pub status: TokenStatus,

    /// Timestamp when the token expires
    pub expires_at: DateTime<Utc>,

    /// Timestamp when the token was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the token was rotated out, if it was
    pub rotated_at: Option<DateTime<Utc>>,
}

impl RefreshToken {
    /// Creates a new active token bound to a family
    pub fn new(
        family: &TokenFamily,
        token_hash: String,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            jti: Uuid::new_v4(),
            family_id: family.family_id,
            user_id: family.user_id,
            device_id: family.device_id.clone(),
            token_hash,
            status: TokenStatus::Active,
            expires_at: now + ttl,
            created_at: now,
            rotated_at: None,
        }
    }

    /// Derives the active successor of this token within the same family
    pub fn successor(&self, token_hash: String, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            jti: Uuid::new_v4(),
            family_id: self.family_id,
            user_id: self.user_id,
            device_id: self.device_id.clone(),
            token_hash,
            status: TokenStatus::Active,
            expires_at: now + ttl,
            created_at: now,
            rotated_at: None,
        }
    }

    /// Checks whether the token is past its expiry at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Checks whether the token is the active head of its family
    pub fn is_active(&self) -> bool {
        self.status == TokenStatus::Active
    }

    /// Retires the token after a successful rotation or supersession
    pub fn mark_rotated(&mut self, now: DateTime<Utc>) {
        self.status = TokenStatus::Rotated;
        self.rotated_at = Some(now);
    }

    /// Revokes the token as part of a family cascade
    pub fn mark_revoked(&mut self) {
        self.status = TokenStatus::Revoked;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_family() -> TokenFamily {
        TokenFamily::new(Uuid::new_v4(), "device-1", Utc::now())
    }

    #[test]
    fn test_new_token_is_active() {
        let family = test_family();
        let now = Utc::now();
        let token = RefreshToken::new(&family, "hash".to_string(), Duration::days(30), now);

        assert!(token.is_active());
        assert_eq!(token.family_id, family.family_id);
        assert_eq!(token.user_id, family.user_id);
        assert_eq!(token.device_id, family.device_id);
        assert_eq!(token.expires_at, now + Duration::days(30));
        assert!(token.rotated_at.is_none());
        assert!(!token.is_expired_at(now));
    }

    #[test]
    fn test_token_expiry() {
        let family = test_family();
        let now = Utc::now();
        let token = RefreshToken::new(&family, "hash".to_string(), Duration::days(1), now);

        assert!(!token.is_expired_at(now + Duration::hours(23)));
        assert!(token.is_expired_at(now + Duration::days(2)));
    }

    #[test]
    fn test_rotation_retires_token() {
        let family = test_family();
        let now = Utc::now();
        let mut token = RefreshToken::new(&family, "hash".to_string(), Duration::days(30), now);

        token.mark_rotated(now);

        assert_eq!(token.status, TokenStatus::Rotated);
        assert_eq!(token.rotated_at, Some(now));
        assert!(!token.is_active());
    }

    #[test]
    fn test_revocation() {
        let family = test_family();
        let mut token =
            RefreshToken::new(&family, "hash".to_string(), Duration::days(30), Utc::now());

        token.mark_revoked();

        assert_eq!(token.status, TokenStatus::Revoked);
        assert!(!token.is_active());
    }

    #[test]
    fn test_successor_stays_in_family() {
        let family = test_family();
        let now = Utc::now();
        let token = RefreshToken::new(&family, "hash-a".to_string(), Duration::days(30), now);

        let next = token.successor("hash-b".to_string(), Duration::days(30), now);

        assert_eq!(next.family_id, token.family_id);
        assert_eq!(next.user_id, token.user_id);
        assert_eq!(next.device_id, token.device_id);
        assert_ne!(next.jti, token.jti);
        assert!(next.is_active());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [TokenStatus::Active, TokenStatus::Rotated, TokenStatus::Revoked] {
            assert_eq!(TokenStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TokenStatus::from_str("unknown"), None);
    }
}
