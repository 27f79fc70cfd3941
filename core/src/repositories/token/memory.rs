//! In-memory token store for single-instance deployment and tests.
//!
//! All data lives under one `RwLock`; a mutation holds the write guard
//! for its whole check-and-apply sequence, which makes each store
//! operation atomic. On top of that, rotation attempts serialize on a
//! per-family async mutex with a bounded wait, standing in for the row
//! locks a relational store would take.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::domain::entities::family::TokenFamily;
use crate::domain::entities::token::RefreshToken;
use crate::errors::StoreError;

use super::r#trait::{RotationOutcome, TokenStore};

const DEFAULT_LOCK_WAIT: StdDuration = StdDuration::from_millis(150);

#[derive(Default)]
struct Inner {
    families: HashMap<Uuid, TokenFamily>,
    /// Keyed by token hash, the lookup used on every rotation
    tokens: HashMap<String, RefreshToken>,
}

/// Single-process implementation of [`TokenStore`]
pub struct InMemoryTokenStore {
    inner: RwLock<Inner>,
    family_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    lock_wait: StdDuration,
}

impl InMemoryTokenStore {
    /// Create a new empty store with the default lock wait
    pub fn new() -> Self {
        Self::with_lock_wait(DEFAULT_LOCK_WAIT)
    }

    /// Create a new empty store with a custom family lock wait
    pub fn with_lock_wait(lock_wait: StdDuration) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            family_locks: Mutex::new(HashMap::new()),
            lock_wait,
        }
    }

    async fn family_lock(&self, family_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.family_locks.lock().await;
        locks
            .entry(family_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl Default for InMemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl InMemoryTokenStore {
    /// Grab and hold a family's rotation lock, for contention tests
    pub(crate) async fn hold_family_lock(
        &self,
        family_id: Uuid,
    ) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = self.family_lock(family_id).await;
        lock.lock_owned().await
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn issue_token(
        &self,
        user_id: Uuid,
        device_id: &str,
        token_hash: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<(TokenFamily, RefreshToken), StoreError> {
        let mut inner = self.inner.write().await;

        if inner.tokens.contains_key(token_hash) {
            return Err(StoreError::Duplicate { what: "token_hash" });
        }

        let family_id = inner
            .families
            .values()
            .find(|f| f.user_id == user_id && f.device_id == device_id && !f.is_revoked())
            .map(|f| f.family_id);

        let family_id = match family_id {
            Some(id) => id,
            None => {
                let family = TokenFamily::new(user_id, device_id, now);
                let id = family.family_id;
                inner.families.insert(id, family);
                id
            }
        };

        // Supersede whatever was active so the family keeps a single head
        for token in inner.tokens.values_mut() {
            if token.family_id == family_id && token.is_active() {
                token.mark_rotated(now);
            }
        }

        let family = inner
            .families
            .get_mut(&family_id)
            .ok_or_else(|| StoreError::Unavailable {
                message: format!("family {family_id} vanished during issue"),
            })?;
        family.touch(now);
        let family = family.clone();

        let token = RefreshToken::new(&family, token_hash.to_string(), ttl, now);
        inner.tokens.insert(token.token_hash.clone(), token.clone());

        Ok((family, token))
    }

    async fn rotate_token(
        &self,
        token_hash: &str,
        successor_hash: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<RotationOutcome, StoreError> {
        // Peek without the family lock to learn which family to serialize on
        let family_id = {
            let inner = self.inner.read().await;
            match inner.tokens.get(token_hash) {
                Some(token) => token.family_id,
                None => return Ok(RotationOutcome::NotFound),
            }
        };

        let lock = self.family_lock(family_id).await;
        let _guard = tokio::time::timeout(self.lock_wait, lock.lock())
            .await
            .map_err(|_| StoreError::Contested)?;

        // Re-read everything under the lock; the token may have been
        // rotated, revoked, or deleted while we waited.
        let mut inner = self.inner.write().await;

        let token = match inner.tokens.get(token_hash) {
            Some(token) => token.clone(),
            None => return Ok(RotationOutcome::NotFound),
        };

        let family = match inner.families.get(&token.family_id) {
            Some(family) => family.clone(),
            None => return Ok(RotationOutcome::NotFound),
        };

        if family.is_revoked() {
            return Ok(RotationOutcome::FamilyRevoked);
        }

        if token.is_expired_at(now) {
            return Ok(RotationOutcome::Expired);
        }

        if !token.is_active() {
            return Ok(RotationOutcome::Reused { token });
        }

        if inner.tokens.contains_key(successor_hash) {
            return Err(StoreError::Duplicate { what: "token_hash" });
        }

        let retired = {
            let stored = inner
                .tokens
                .get_mut(token_hash)
                .ok_or_else(|| StoreError::Unavailable {
                    message: "token vanished inside the critical section".to_string(),
                })?;
            stored.mark_rotated(now);
            stored.clone()
        };

        let successor = retired.successor(successor_hash.to_string(), ttl, now);
        inner
            .tokens
            .insert(successor.token_hash.clone(), successor.clone());

        if let Some(family) = inner.families.get_mut(&retired.family_id) {
            family.touch(now);
        }

        Ok(RotationOutcome::Rotated { retired, successor })
    }

    async fn revoke_family(
        &self,
        family_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<TokenFamily>, StoreError> {
        let mut inner = self.inner.write().await;

        let family = match inner.families.get_mut(&family_id) {
            Some(family) => {
                family.revoke(now);
                family.clone()
            }
            None => return Ok(None),
        };

        for token in inner.tokens.values_mut() {
            if token.family_id == family_id {
                token.mark_revoked();
            }
        }

        Ok(Some(family))
    }

    async fn find_token(&self, token_hash: &str) -> Result<Option<RefreshToken>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.tokens.get(token_hash).cloned())
    }

    async fn find_family(&self, family_id: Uuid) -> Result<Option<TokenFamily>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.families.get(&family_id).cloned())
    }

    async fn tokens_in_family(&self, family_id: Uuid) -> Result<Vec<RefreshToken>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .tokens
            .values()
            .filter(|t| t.family_id == family_id)
            .cloned()
            .collect())
    }

    async fn delete_expired_tokens(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut inner = self.inner.write().await;
        let initial_count = inner.tokens.len();

        inner.tokens.retain(|_, token| token.expires_at >= cutoff);

        Ok(initial_count - inner.tokens.len())
    }

    async fn delete_empty_families(&self) -> Result<usize, StoreError> {
        let mut inner = self.inner.write().await;

        let occupied: std::collections::HashSet<Uuid> =
            inner.tokens.values().map(|t| t.family_id).collect();

        let initial_count = inner.families.len();
        inner.families.retain(|id, _| occupied.contains(id));
        let deleted = initial_count - inner.families.len();

        // Drop serialization locks for families that no longer exist
        let mut locks = self.family_locks.lock().await;
        locks.retain(|id, _| occupied.contains(id));

        Ok(deleted)
    }
}
