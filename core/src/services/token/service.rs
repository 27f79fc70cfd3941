//! Rotation service: issuing, rotating, and revoking refresh tokens.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::entities::token::RefreshToken;
use crate::domain::events::ReuseAlert;
use crate::errors::{DomainResult, TokenError};
use crate::repositories::token::{RotationOutcome, TokenStore};

use super::alerts::SecurityAlertSink;
use super::config::RotationConfig;

/// Request context forwarded by the transport layer, used for logging
/// and alert correlation only
#[derive(Debug, Clone, Default)]
pub struct ClientMetadata {
    /// IP address of the request
    pub ip_address: Option<String>,
    /// User agent string from the request
    pub user_agent: Option<String>,
}

/// A freshly minted refresh token.
///
/// `secret` is the only place the raw value ever appears; the store keeps
/// its hash and nothing else.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Raw secret to hand to the client
    pub secret: String,
    /// Identifier of the stored token
    pub jti: Uuid,
    /// Family the token belongs to
    pub family_id: Uuid,
    /// Timestamp when the token expires
    pub expires_at: DateTime<Utc>,
}

/// Service for issuing and rotating refresh tokens with reuse detection
pub struct RotationService<S: TokenStore> {
    store: Arc<S>,
    alerts: Arc<dyn SecurityAlertSink>,
    config: RotationConfig,
}

impl<S: TokenStore> RotationService<S> {
    /// Creates a new rotation service
    ///
    /// # Arguments
    ///
    /// * `store` - Token store for persistence
    /// * `alerts` - Sink for security-classified events
    /// * `config` - Rotation configuration
    pub fn new(store: Arc<S>, alerts: Arc<dyn SecurityAlertSink>, config: RotationConfig) -> Self {
        Self {
            store,
            alerts,
            config,
        }
    }

    /// Issues the initial refresh token for a (user, device) pair.
    ///
    /// Called by the login flow after credentials have been verified.
    /// Reuses the unrevoked family for the pair if one exists, creating
    /// it otherwise; any previously active token in the family is
    /// superseded.
    pub async fn issue(
        &self,
        user_id: Uuid,
        device_id: &str,
        metadata: &ClientMetadata,
    ) -> DomainResult<IssuedToken> {
        let now = Utc::now();
        let secret = self.generate_secret();
        let token_hash = hash_token(&secret);

        let (family, token) = self
            .store
            .issue_token(user_id, device_id, &token_hash, self.config.token_ttl(), now)
            .await?;

        info!(
            user_id = %user_id,
            family_id = %family.family_id,
            jti = %token.jti,
            ip = ?metadata.ip_address,
            "issued refresh token"
        );

        Ok(issued(secret, &token))
    }

    /// Rotates a presented refresh token to its successor.
    ///
    /// The whole validation sequence runs inside the store's critical
    /// section; this method only maps the outcome. A non-active token
    /// routes through reuse handling, which revokes the family before
    /// the error is returned.
    pub async fn rotate(
        &self,
        presented_secret: &str,
        metadata: &ClientMetadata,
    ) -> DomainResult<IssuedToken> {
        let now = Utc::now();
        let presented_hash = hash_token(presented_secret);
        let secret = self.generate_secret();
        let successor_hash = hash_token(&secret);

        let outcome = self
            .store
            .rotate_token(&presented_hash, &successor_hash, self.config.token_ttl(), now)
            .await?;

        match outcome {
            RotationOutcome::Rotated { retired, successor } => {
                debug!(
                    family_id = %successor.family_id,
                    retired_jti = %retired.jti,
                    jti = %successor.jti,
                    "rotated refresh token"
                );
                Ok(issued(secret, &successor))
            }
            RotationOutcome::NotFound => Err(TokenError::InvalidToken.into()),
            RotationOutcome::FamilyRevoked => Err(TokenError::FamilyRevoked.into()),
            RotationOutcome::Expired => Err(TokenError::ExpiredToken.into()),
            RotationOutcome::Reused { token } => self.handle_reuse(&token, metadata, now).await,
        }
    }

    /// Revokes a family and every token under it (logout-all for the
    /// device). Idempotent; revoking an unknown family is a no-op.
    pub async fn revoke_family(&self, family_id: Uuid) -> DomainResult<()> {
        let now = Utc::now();

        match self.store.revoke_family(family_id, now).await? {
            Some(family) => {
                info!(
                    user_id = %family.user_id,
                    family_id = %family.family_id,
                    "token family revoked"
                );
            }
            None => {
                debug!(family_id = %family_id, "revocation requested for unknown family");
            }
        }

        Ok(())
    }

    /// Reuse handling: cascade revoke, then alert, then a uniform error.
    ///
    /// The error is the same whether or not the family was already
    /// revoked, so a probing caller learns nothing from the response.
    async fn handle_reuse(
        &self,
        token: &RefreshToken,
        metadata: &ClientMetadata,
        now: DateTime<Utc>,
    ) -> DomainResult<IssuedToken> {
        self.store.revoke_family(token.family_id, now).await?;

        debug!(
            family_id = %token.family_id,
            ip = ?metadata.ip_address,
            user_agent = ?metadata.user_agent,
            "reuse cascade applied"
        );

        self.alerts.publish(ReuseAlert::for_token(token, now)).await;

        Err(TokenError::ReuseDetected.into())
    }

    fn generate_secret(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.config.secret_length)
            .map(char::from)
            .collect()
    }
}

/// Hashes a raw token secret for storage and lookup
pub fn hash_token(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn issued(secret: String, token: &RefreshToken) -> IssuedToken {
    IssuedToken {
        secret,
        jti: token.jti,
        family_id: token.family_id,
        expires_at: token.expires_at,
    }
}
