//! Parks colliding credentials between the link offer and the user's answer.

use std::sync::Arc;
use std::time::Duration;

use crate::models::account::PendingCredential;
use crate::repositories::HandshakeStore;
use crate::utils::token::random_token;

pub const PENDING_LINK_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Clone)]
pub struct PendingLinkStore {
    handshakes: Arc<dyn HandshakeStore>,
    ttl: Duration,
}

impl PendingLinkStore {
    pub fn new(handshakes: Arc<dyn HandshakeStore>) -> Self {
        Self::with_ttl(handshakes, PENDING_LINK_TTL)
    }

    pub fn with_ttl(handshakes: Arc<dyn HandshakeStore>, ttl: Duration) -> Self {
        Self { handshakes, ttl }
    }

    fn key(token: &str) -> String {
        format!("pending_link:{}", token)
    }

    /// Returns the opaque token the client echoes back.
    pub async fn park(&self, pending: &PendingCredential) -> anyhow::Result<String> {
        let token = random_token();
        let value = serde_json::to_string(pending)?;
        self.handshakes.put(&Self::key(&token), value, self.ttl).await?;
        Ok(token)
    }

    /// One-shot; a second claim with the same token finds nothing.
    pub async fn claim(&self, token: &str) -> anyhow::Result<Option<PendingCredential>> {
        match self.handshakes.take(&Self::key(token)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::NewIdentity;
    use crate::models::sign_in_method::SignInMethod;
    use crate::repositories::handshake::MockHandshakeStore;
    use crate::repositories::InMemoryHandshakeStore;

    fn pending() -> PendingCredential {
        PendingCredential::new(
            NewIdentity::federated(SignInMethod::Google, "g-1"),
            "reader@example.com",
            None,
        )
    }

    #[tokio::test]
    async fn claimed_credentials_are_gone() {
        let store = PendingLinkStore::new(Arc::new(InMemoryHandshakeStore::new()));
        let token = store.park(&pending()).await.unwrap();
        assert_eq!(store.claim(&token).await.unwrap(), Some(pending()));
        assert_eq!(store.claim(&token).await.unwrap(), None);
        assert_eq!(store.ttl(), PENDING_LINK_TTL);
    }

    #[tokio::test]
    async fn parks_under_a_prefixed_key_with_its_ttl() {
        let mut handshakes = MockHandshakeStore::new();
        handshakes
            .expect_put()
            .withf(|key, value, ttl| {
                key.starts_with("pending_link:")
                    && value.contains("reader@example.com")
                    && *ttl == Duration::from_secs(30)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let store = PendingLinkStore::with_ttl(Arc::new(handshakes), Duration::from_secs(30));
        let token = store.park(&pending()).await.unwrap();
        assert_eq!(token.len(), 43);
    }

    #[tokio::test]
    async fn storage_failures_surface_as_errors() {
        let mut handshakes = MockHandshakeStore::new();
        handshakes
            .expect_take()
            .returning(|_| Err(anyhow::anyhow!("redis down")));

        let store = PendingLinkStore::new(Arc::new(handshakes));
        assert!(store.claim("token").await.is_err());
    }
}
