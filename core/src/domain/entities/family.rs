//! Token family entity.
//!
//! A family groups every refresh token descending from one login session
//! for a (user, device) pair. At most one unrevoked family exists per
//! pair; revocation is permanent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chain of refresh tokens rooted in one login session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenFamily {
    /// Unique identifier for the family
    pub family_id: Uuid,

    /// User this family belongs to
    pub user_id: Uuid,

    /// Device the session was established on
    pub device_id: String,

    /// Timestamp when the family was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the family was revoked, if ever. Once set it is
    /// never cleared or overwritten.
    pub revoked_at: Option<DateTime<Utc>>,

    /// Timestamp of the last issue or rotation in this family
    pub last_used_at: DateTime<Utc>,
}

impl TokenFamily {
    /// Creates a new unrevoked family for a (user, device) pair
    pub fn new(user_id: Uuid, device_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            family_id: Uuid::new_v4(),
            user_id,
            device_id: device_id.into(),
            created_at: now,
            revoked_at: None,
            last_used_at: now,
        }
    }

    /// Checks whether the family has been revoked
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Revokes the family. Idempotent: a second call keeps the original
    /// revocation timestamp.
    pub fn revoke(&mut self, now: DateTime<Utc>) {
        if self.revoked_at.is_none() {
            self.revoked_at = Some(now);
        }
    }

    /// Records use of the family by an issue or rotation
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_used_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_family_is_unrevoked() {
        let now = Utc::now();
        let family = TokenFamily::new(Uuid::new_v4(), "device-1", now);

        assert!(!family.is_revoked());
        assert_eq!(family.created_at, now);
        assert_eq!(family.last_used_at, now);
    }

    #[test]
    fn test_revocation_is_permanent() {
        let now = Utc::now();
        let mut family = TokenFamily::new(Uuid::new_v4(), "device-1", now);

        let first = now + Duration::minutes(5);
        family.revoke(first);
        assert_eq!(family.revoked_at, Some(first));

        // A later revocation must not move the timestamp
        family.revoke(first + Duration::minutes(10));
        assert_eq!(family.revoked_at, Some(first));
    }

    #[test]
    fn test_touch_updates_last_used() {
        let now = Utc::now();
        let mut family = TokenFamily::new(Uuid::new_v4(), "device-1", now);

        let later = now + Duration::seconds(30);
        family.touch(later);

        assert_eq!(family.last_used_at, later);
        assert_eq!(family.created_at, now);
    }
}
