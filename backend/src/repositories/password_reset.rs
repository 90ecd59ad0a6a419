use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::models::password_reset::PasswordReset;
use crate::types::{AccountId, PasswordResetId};

const SELECT_COLUMNS: &str = "id, account_id, token_hash, expires_at, created_at, used_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PasswordResetStore: Send + Sync {
    async fn create(
        &self,
        account_id: AccountId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<PasswordReset>;

    async fn find_by_token_hash(&self, token_hash: &str)
        -> anyhow::Result<Option<PasswordReset>>;

    /// Marks the token used. Returns `false` if it was already used.
    async fn mark_used(&self, id: PasswordResetId, used_at: DateTime<Utc>)
        -> anyhow::Result<bool>;

    async fn delete_expired(&self, now: DateTime<Utc>) -> anyhow::Result<u64>;
}

#[derive(Debug, Clone)]
pub struct PgPasswordResetStore {
    pool: PgPool,
}

impl PgPasswordResetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PasswordResetStore for PgPasswordResetStore {
    async fn create(
        &self,
        account_id: AccountId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<PasswordReset> {
        let record = sqlx::query_as::<_, PasswordReset>(&format!(
            "INSERT INTO password_resets (id, account_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            SELECT_COLUMNS
        ))
        .bind(PasswordResetId::new())
        .bind(account_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .context("insert password reset")?;
        Ok(record)
    }

    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> anyhow::Result<Option<PasswordReset>> {
        let record = sqlx::query_as::<_, PasswordReset>(&format!(
            "SELECT {} FROM password_resets WHERE token_hash = $1",
            SELECT_COLUMNS
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .context("find password reset")?;
        Ok(record)
    }

    async fn mark_used(
        &self,
        id: PasswordResetId,
        used_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE password_resets SET used_at = $1 WHERE id = $2 AND used_at IS NULL",
        )
        .bind(used_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("mark password reset used")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM password_resets WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .context("delete expired password resets")?;
        Ok(result.rows_affected())
    }
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
