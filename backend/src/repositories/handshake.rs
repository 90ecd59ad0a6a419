//! Short-lived, one-shot state shared between the two halves of a handshake
//! (OAuth state and PKCE verifier, parked link credentials).
//!
//! Entries live in Redis so a follow-up request can land on any instance.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::redis::{self, AsyncCommands};

use crate::db::redis::RedisPool;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HandshakeStore: Send + Sync {
    /// Stores `value` under `key`, replacing any previous entry.
    async fn put(&self, key: &str, value: String, ttl: Duration) -> anyhow::Result<()>;

    /// Removes and returns the entry. A second call for the same key yields `None`.
    async fn take(&self, key: &str) -> anyhow::Result<Option<String>>;
}

pub struct RedisHandshakeStore {
    pool: RedisPool,
}

impl RedisHandshakeStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    fn redis_key(key: &str) -> String {
        format!("handshake:{}", key)
    }
}

#[async_trait]
impl HandshakeStore for RedisHandshakeStore {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> anyhow::Result<()> {
        tracing::debug!(key, ttl_secs = ttl.as_secs(), "Storing handshake state");
        let mut conn = self.pool.get().await?;
        // SET EX rejects a zero expiry.
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(Self::redis_key(key), value, seconds)
            .await?;
        Ok(())
    }

    async fn take(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.pool.get().await?;
        let value: Option<String> = redis::cmd("GETDEL")
            .arg(Self::redis_key(key))
            .query_async(&mut *conn)
            .await?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(
            RedisHandshakeStore::redis_key("pending_link:abc"),
            "handshake:pending_link:abc"
        );
    }
}
