//! Token store trait defining the persistence contract for families and tokens.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::entities::family::TokenFamily;
use crate::domain::entities::token::RefreshToken;
use crate::errors::StoreError;

/// Result of an atomic rotation attempt.
///
/// Only `Rotated` mutates the store. Every other outcome leaves it
/// untouched and reports what the critical section observed; the caller
/// decides how to surface it.
#[derive(Debug, Clone)]
pub enum RotationOutcome {
    /// The presented token was active. It is now rotated and `successor`
    /// is the new active token in the same family.
    Rotated {
        retired: RefreshToken,
        successor: RefreshToken,
    },

    /// No token matches the presented hash.
    NotFound,

    /// The owning family is revoked.
    FamilyRevoked,

    /// The token is past its expiry.
    Expired,

    /// A non-active token was presented. `token` is the stored row, for
    /// reuse handling by the caller.
    Reused { token: RefreshToken },
}

/// Persistence contract for token families and refresh tokens
///
/// Implementations must make `issue_token`, `rotate_token`, and
/// `revoke_family` atomic: a transaction in a relational store, an
/// exclusive critical section in an in-memory one. Partial application of
/// any of the three must never be observable, and concurrent rotations of
/// the same token must be serialized per family.
///
/// # Security Considerations
/// - Only token hashes cross this boundary; raw secrets never do
/// - A family's `revoked_at`, once set, must never be cleared
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Atomically issue a new active token for a (user, device) pair.
    ///
    /// Finds the unrevoked family for the pair or creates one, marks any
    /// currently active token in it as rotated (supersession), inserts a
    /// new active token with `token_hash`, and updates `last_used_at`.
    ///
    /// # Returns
    /// * `Ok((family, token))` - The family and the newly inserted token
    /// * `Err(StoreError)` - Persistence failed; nothing was applied
    async fn issue_token(
        &self,
        user_id: Uuid,
        device_id: &str,
        token_hash: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<(TokenFamily, RefreshToken), StoreError>;

    /// Atomically attempt to rotate the token matching `token_hash`.
    ///
    /// Under the family lock, checks in order: token exists, family not
    /// revoked, token not expired, token still active. On success the
    /// token is retired, a successor with `successor_hash` is inserted,
    /// and the family's `last_used_at` is updated; otherwise nothing is
    /// mutated and the observed state is reported.
    ///
    /// A lock wait past the configured bound fails with
    /// `StoreError::Contested`.
    async fn rotate_token(
        &self,
        token_hash: &str,
        successor_hash: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<RotationOutcome, StoreError>;

    /// Revoke a family and cascade to every token under it.
    ///
    /// Idempotent: revoking an already-revoked family keeps the original
    /// `revoked_at` and still forces all tokens to revoked status.
    ///
    /// # Returns
    /// * `Ok(Some(family))` - The family after revocation
    /// * `Ok(None)` - No such family
    async fn revoke_family(
        &self,
        family_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<TokenFamily>, StoreError>;

    /// Find a token by its hashed secret
    async fn find_token(&self, token_hash: &str) -> Result<Option<RefreshToken>, StoreError>;

    /// Find a family by id
    async fn find_family(&self, family_id: Uuid) -> Result<Option<TokenFamily>, StoreError>;

    /// All tokens belonging to a family, regardless of status
    async fn tokens_in_family(&self, family_id: Uuid) -> Result<Vec<RefreshToken>, StoreError>;

    /// Delete every token whose expiry is older than `cutoff`.
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of tokens deleted
    async fn delete_expired_tokens(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Delete every family left with zero tokens.
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of families deleted
    async fn delete_empty_families(&self) -> Result<usize, StoreError>;

    /// Count active tokens in a family
    async fn count_active_tokens(&self, family_id: Uuid) -> Result<usize, StoreError> {
        let tokens = self.tokens_in_family(family_id).await?;
        Ok(tokens.iter().filter(|t| t.is_active()).count())
    }
}
