//! Interactive steps of federated sign-in.
//!
//! A browser popup or redirect is modelled as an async call that yields the
//! provider identity or [`AuthError::CancelledByUser`]. The HTTP layer backs
//! these traits with an authorization-code exchange; tests script them.

use async_trait::async_trait;

use crate::models::account::{NewIdentity, PendingCredential};
use crate::models::sign_in_method::SignInMethod;
use crate::services::linking::LinkOffer;
use crate::services::AuthError;

pub mod oauth;

/// Identity asserted by an OAuth provider after a completed sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub method: SignInMethod,
    /// The provider's stable user id.
    pub subject: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl FederatedIdentity {
    pub fn into_pending(self) -> PendingCredential {
        PendingCredential::new(
            NewIdentity::federated(self.method, self.subject),
            &self.email,
            self.display_name,
        )
    }
}

/// Runs the provider sign-in for a method.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InteractiveSignIn: Send + Sync {
    /// Fails with [`AuthError::CancelledByUser`] when the user dismisses the step.
    async fn sign_in(&self, method: SignInMethod) -> Result<FederatedIdentity, AuthError>;
}

/// Asks the user whether a new method may be linked to their existing account.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConsentPrompt: Send + Sync {
    async fn confirm_link(&self, offer: &LinkOffer) -> Result<bool, AuthError>;
}

/// Consent already collected by an earlier request.
#[derive(Debug, Clone, Copy)]
pub struct PreAnsweredConsent(pub bool);

#[async_trait]
impl ConsentPrompt for PreAnsweredConsent {
    async fn confirm_link(&self, _offer: &LinkOffer) -> Result<bool, AuthError> {
        Ok(self.0)
    }
}

/// Sign-in that already happened; only the matching method is accepted.
#[derive(Debug, Clone)]
pub struct CompletedSignIn(pub FederatedIdentity);

#[async_trait]
impl InteractiveSignIn for CompletedSignIn {
    async fn sign_in(&self, method: SignInMethod) -> Result<FederatedIdentity, AuthError> {
        if method != self.0.method {
            return Err(AuthError::InvalidInput(format!(
                "Expected a {} sign-in, got {}",
                method.display_name(),
                self.0.method.display_name()
            )));
        }
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn github() -> FederatedIdentity {
        FederatedIdentity {
            method: SignInMethod::GitHub,
            subject: "42".into(),
            email: "Reader@Example.com".into(),
            display_name: Some("Reader".into()),
        }
    }

    #[tokio::test]
    async fn completed_sign_in_rejects_other_providers() {
        let sign_in = CompletedSignIn(github());
        assert!(sign_in.sign_in(SignInMethod::GitHub).await.is_ok());
        assert!(matches!(
            sign_in.sign_in(SignInMethod::Google).await,
            Err(AuthError::InvalidInput(_))
        ));
    }

    #[test]
    fn pending_credential_normalizes_email() {
        let pending = github().into_pending();
        assert_eq!(pending.email, "reader@example.com");
        assert_eq!(pending.method(), SignInMethod::GitHub);
        assert_eq!(pending.identity.subject, "42");
    }
}
