//! MySQL implementation of the TokenStore trait.
//!
//! Each mutating operation runs inside one transaction. The family row,
//! locked with `SELECT ... FOR UPDATE`, is the serialization point:
//! every writer takes it before touching token rows, so concurrent
//! rotations of the same token are strictly ordered and the
//! single-active-head invariant holds across instances. Lock waits are
//! bounded by `innodb_lock_wait_timeout`, set per transaction.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::mysql::{MySqlDatabaseError, MySqlRow};
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

use sv_core::domain::entities::family::TokenFamily;
use sv_core::domain::entities::token::{RefreshToken, TokenStatus};
use sv_core::errors::StoreError;
use sv_core::repositories::token::{RotationOutcome, TokenStore};

const FAMILY_COLUMNS: &str =
    "family_id, user_id, device_id, created_at, revoked_at, last_used_at";
const TOKEN_COLUMNS: &str =
    "jti, family_id, user_id, device_id, token_hash, status, expires_at, created_at, rotated_at";

/// MySQL implementation of TokenStore
pub struct MySqlTokenStore {
    /// Database connection pool
    pool: MySqlPool,
    /// Family lock wait bound in seconds. InnoDB cannot wait for less
    /// than one second, so millisecond configs round up.
    lock_wait_secs: u64,
}

impl MySqlTokenStore {
    /// Create a new MySQL token store
    ///
    /// # Arguments
    /// * `pool` - MySQL connection pool from SQLx
    /// * `lock_wait_ms` - Configured lock wait bound in milliseconds
    pub fn new(pool: MySqlPool, lock_wait_ms: u64) -> Self {
        Self {
            pool,
            lock_wait_secs: lock_wait_secs(lock_wait_ms),
        }
    }

    /// Convert a database row to a TokenFamily entity
    fn row_to_family(row: &MySqlRow) -> Result<TokenFamily, StoreError> {
        let family_id: String = row
            .try_get("family_id")
            .map_err(|e| column_err("family_id", e))?;
        let user_id: String = row
            .try_get("user_id")
            .map_err(|e| column_err("user_id", e))?;

        Ok(TokenFamily {
            family_id: parse_uuid("family_id", &family_id)?,
            user_id: parse_uuid("user_id", &user_id)?,
            device_id: row
                .try_get("device_id")
                .map_err(|e| column_err("device_id", e))?,
            created_at: row
                .try_get::<DateTime<Utc>, _>("created_at")
                .map_err(|e| column_err("created_at", e))?,
            revoked_at: row
                .try_get::<Option<DateTime<Utc>>, _>("revoked_at")
                .map_err(|e| column_err("revoked_at", e))?,
            last_used_at: row
                .try_get::<DateTime<Utc>, _>("last_used_at")
                .map_err(|e| column_err("last_used_at", e))?,
        })
    }

    /// Convert a database row to a RefreshToken entity
    fn row_to_token(row: &MySqlRow) -> Result<RefreshToken, StoreError> {
        let jti: String = row.try_get("jti").map_err(|e| column_err("jti", e))?;
        let family_id: String = row
            .try_get("family_id")
            .map_err(|e| column_err("family_id", e))?;
        let user_id: String = row
            .try_get("user_id")
            .map_err(|e| column_err("user_id", e))?;
        let status: String = row.try_get("status").map_err(|e| column_err("status", e))?;

        Ok(RefreshToken {
            jti: parse_uuid("jti", &jti)?,
            family_id: parse_uuid("family_id", &family_id)?,
            user_id: parse_uuid("user_id", &user_id)?,
            device_id: row
                .try_get("device_id")
                .map_err(|e| column_err("device_id", e))?,
            token_hash: row
                .try_get("token_hash")
                .map_err(|e| column_err("token_hash", e))?,
            status: TokenStatus::from_str(&status).ok_or_else(|| StoreError::Unavailable {
                message: format!("Unknown token status in store: {status}"),
            })?,
            expires_at: row
                .try_get::<DateTime<Utc>, _>("expires_at")
                .map_err(|e| column_err("expires_at", e))?,
            created_at: row
                .try_get::<DateTime<Utc>, _>("created_at")
                .map_err(|e| column_err("created_at", e))?,
            rotated_at: row
                .try_get::<Option<DateTime<Utc>>, _>("rotated_at")
                .map_err(|e| column_err("rotated_at", e))?,
        })
    }

    async fn begin_locked_tx(
        &self,
    ) -> Result<sqlx::Transaction<'_, sqlx::MySql>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_err("Failed to begin transaction", e))?;

        // Prepared statements cannot parameterize SET; the value is a
        // validated integer from our own config.
        let stmt = format!(
            "SET SESSION innodb_lock_wait_timeout = {}",
            self.lock_wait_secs
        );
        sqlx::query(&stmt)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_err("Failed to set lock wait timeout", e))?;

        Ok(tx)
    }

    /// Lock the family row, serializing all writers in the family
    async fn lock_family(
        tx: &mut sqlx::Transaction<'_, sqlx::MySql>,
        family_id: Uuid,
    ) -> Result<Option<TokenFamily>, StoreError> {
        let query = format!(
            "SELECT {FAMILY_COLUMNS} FROM token_families WHERE family_id = ? FOR UPDATE"
        );

        let row = sqlx::query(&query)
            .bind(family_id.to_string())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| store_err("Failed to lock token family", e))?;

        row.map(|r| Self::row_to_family(&r)).transpose()
    }

    async fn insert_token(
        tx: &mut sqlx::Transaction<'_, sqlx::MySql>,
        token: &RefreshToken,
    ) -> Result<(), StoreError> {
        let query = format!(
            "INSERT INTO refresh_tokens ({TOKEN_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );

        sqlx::query(&query)
            .bind(token.jti.to_string())
            .bind(token.family_id.to_string())
            .bind(token.user_id.to_string())
            .bind(&token.device_id)
            .bind(&token.token_hash)
            .bind(token.status.as_str())
            .bind(token.expires_at)
            .bind(token.created_at)
            .bind(token.rotated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| match store_err("Failed to insert refresh token", e) {
                StoreError::Duplicate { .. } => StoreError::Duplicate { what: "token_hash" },
                other => other,
            })?;

        Ok(())
    }

    /// Mark every active token in the family as rotated
    async fn supersede_active(
        tx: &mut sqlx::Transaction<'_, sqlx::MySql>,
        family_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE refresh_tokens SET status = 'rotated', rotated_at = ? \
             WHERE family_id = ? AND status = 'active'",
        )
        .bind(now)
        .bind(family_id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(|e| store_err("Failed to supersede active tokens", e))?;

        Ok(())
    }

    async fn touch_family(
        tx: &mut sqlx::Transaction<'_, sqlx::MySql>,
        family_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE token_families SET last_used_at = ? WHERE family_id = ?")
            .bind(now)
            .bind(family_id.to_string())
            .execute(&mut **tx)
            .await
            .map_err(|e| store_err("Failed to update family last_used_at", e))?;

        Ok(())
    }
}

#[async_trait]
impl TokenStore for MySqlTokenStore {
    async fn issue_token(
        &self,
        user_id: Uuid,
        device_id: &str,
        token_hash: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<(TokenFamily, RefreshToken), StoreError> {
        let mut tx = self.begin_locked_tx().await?;

        let select = format!(
            "SELECT {FAMILY_COLUMNS} FROM token_families \
             WHERE user_id = ? AND device_id = ? AND revoked_at IS NULL \
             LIMIT 1 FOR UPDATE"
        );

        let existing = sqlx::query(&select)
            .bind(user_id.to_string())
            .bind(device_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| store_err("Failed to look up token family", e))?
            .map(|row| Self::row_to_family(&row))
            .transpose()?;

        let mut family = match existing {
            Some(family) => family,
            None => {
                let family = TokenFamily::new(user_id, device_id, now);
                let insert = format!(
                    "INSERT INTO token_families ({FAMILY_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"
                );
                let inserted = sqlx::query(&insert)
                    .bind(family.family_id.to_string())
                    .bind(family.user_id.to_string())
                    .bind(&family.device_id)
                    .bind(family.created_at)
                    .bind(family.revoked_at)
                    .bind(family.last_used_at)
                    .execute(&mut *tx)
                    .await;

                match inserted {
                    Ok(_) => family,
                    // Another instance won the creation race; take its row
                    Err(e) if is_unique_violation(&e) => {
                        let row = sqlx::query(&select)
                            .bind(user_id.to_string())
                            .bind(device_id)
                            .fetch_optional(&mut *tx)
                            .await
                            .map_err(|e| store_err("Failed to re-read token family", e))?
                            .ok_or_else(|| StoreError::Unavailable {
                                message: "Family creation race left no unrevoked family"
                                    .to_string(),
                            })?;
                        Self::row_to_family(&row)?
                    }
                    Err(e) => return Err(store_err("Failed to insert token family", e)),
                }
            }
        };

        Self::supersede_active(&mut tx, family.family_id, now).await?;
        Self::touch_family(&mut tx, family.family_id, now).await?;
        family.touch(now);

        let token = RefreshToken::new(&family, token_hash.to_string(), ttl, now);
        Self::insert_token(&mut tx, &token).await?;

        tx.commit()
            .await
            .map_err(|e| store_err("Failed to commit token issue", e))?;

        Ok((family, token))
    }

    async fn rotate_token(
        &self,
        token_hash: &str,
        successor_hash: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<RotationOutcome, StoreError> {
        let mut tx = self.begin_locked_tx().await?;

        // Unlocked peek to learn which family to serialize on
        let token_select =
            format!("SELECT {TOKEN_COLUMNS} FROM refresh_tokens WHERE token_hash = ? LIMIT 1");

        let peeked = sqlx::query(&token_select)
            .bind(token_hash)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| store_err("Failed to look up refresh token", e))?;

        let family_id = match peeked {
            Some(row) => Self::row_to_token(&row)?.family_id,
            None => return Ok(RotationOutcome::NotFound),
        };

        let family = match Self::lock_family(&mut tx, family_id).await? {
            Some(family) => family,
            None => return Ok(RotationOutcome::NotFound),
        };

        if family.is_revoked() {
            return Ok(RotationOutcome::FamilyRevoked);
        }

        // Re-read under the family lock; the row may have changed while
        // we waited.
        let row = sqlx::query(&token_select)
            .bind(token_hash)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| store_err("Failed to re-read refresh token", e))?;

        let mut token = match row {
            Some(row) => Self::row_to_token(&row)?,
            None => return Ok(RotationOutcome::NotFound),
        };

        if token.is_expired_at(now) {
            return Ok(RotationOutcome::Expired);
        }

        if !token.is_active() {
            return Ok(RotationOutcome::Reused { token });
        }

        sqlx::query(
            "UPDATE refresh_tokens SET status = 'rotated', rotated_at = ? WHERE jti = ?",
        )
        .bind(now)
        .bind(token.jti.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| store_err("Failed to retire refresh token", e))?;
        token.mark_rotated(now);

        let successor = token.successor(successor_hash.to_string(), ttl, now);
        Self::insert_token(&mut tx, &successor).await?;
        Self::touch_family(&mut tx, family_id, now).await?;

        tx.commit()
            .await
            .map_err(|e| store_err("Failed to commit rotation", e))?;

        Ok(RotationOutcome::Rotated {
            retired: token,
            successor,
        })
    }

    async fn revoke_family(
        &self,
        family_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<TokenFamily>, StoreError> {
        let mut tx = self.begin_locked_tx().await?;

        let mut family = match Self::lock_family(&mut tx, family_id).await? {
            Some(family) => family,
            None => return Ok(None),
        };

        if !family.is_revoked() {
            sqlx::query("UPDATE token_families SET revoked_at = ? WHERE family_id = ?")
                .bind(now)
                .bind(family_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| store_err("Failed to revoke token family", e))?;
            family.revoke(now);
        }

        sqlx::query(
            "UPDATE refresh_tokens SET status = 'revoked' \
             WHERE family_id = ? AND status <> 'revoked'",
        )
        .bind(family_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| store_err("Failed to cascade family revocation", e))?;

        tx.commit()
            .await
            .map_err(|e| store_err("Failed to commit family revocation", e))?;

        Ok(Some(family))
    }

    async fn find_token(&self, token_hash: &str) -> Result<Option<RefreshToken>, StoreError> {
        let query =
            format!("SELECT {TOKEN_COLUMNS} FROM refresh_tokens WHERE token_hash = ? LIMIT 1");

        let row = sqlx::query(&query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("Failed to find refresh token", e))?;

        row.map(|r| Self::row_to_token(&r)).transpose()
    }

    async fn find_family(&self, family_id: Uuid) -> Result<Option<TokenFamily>, StoreError> {
        let query =
            format!("SELECT {FAMILY_COLUMNS} FROM token_families WHERE family_id = ? LIMIT 1");

        let row = sqlx::query(&query)
            .bind(family_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("Failed to find token family", e))?;

        row.map(|r| Self::row_to_family(&r)).transpose()
    }

    async fn tokens_in_family(&self, family_id: Uuid) -> Result<Vec<RefreshToken>, StoreError> {
        let query = format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens \
             WHERE family_id = ? ORDER BY created_at ASC"
        );

        let rows = sqlx::query(&query)
            .bind(family_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err("Failed to list family tokens", e))?;

        rows.iter().map(Self::row_to_token).collect()
    }

    async fn delete_expired_tokens(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| store_err("Failed to delete expired tokens", e))?;

        Ok(result.rows_affected() as usize)
    }

    async fn delete_empty_families(&self) -> Result<usize, StoreError> {
        let result = sqlx::query(
            "DELETE tf FROM token_families tf \
             LEFT JOIN refresh_tokens rt ON rt.family_id = tf.family_id \
             WHERE rt.jti IS NULL",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("Failed to delete empty families", e))?;

        Ok(result.rows_affected() as usize)
    }
}

fn store_err(context: &str, e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if let Some(mysql_err) = db.try_downcast_ref::<MySqlDatabaseError>() {
            // MySQL error 1205: lock wait timeout exceeded
            if mysql_err.number() == 1205 {
                return StoreError::Contested;
            }
        }
        if db.is_unique_violation() {
            return StoreError::Duplicate { what: "row" };
        }
    }

    StoreError::Unavailable {
        message: format!("{context}: {e}"),
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn column_err(column: &str, e: sqlx::Error) -> StoreError {
    StoreError::Unavailable {
        message: format!("Failed to read column {column}: {e}"),
    }
}

fn parse_uuid(column: &str, value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value).map_err(|e| StoreError::Unavailable {
        message: format!("Invalid UUID in column {column}: {e}"),
    })
}

/// InnoDB cannot wait for less than one second; round millisecond
/// configs up
fn lock_wait_secs(lock_wait_ms: u64) -> u64 {
    lock_wait_ms.div_ceil(1000).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_wait_rounds_up_to_whole_seconds() {
        assert_eq!(lock_wait_secs(150), 1);
        assert_eq!(lock_wait_secs(1000), 1);
        assert_eq!(lock_wait_secs(1500), 2);
        assert_eq!(lock_wait_secs(0), 1);
    }
}
