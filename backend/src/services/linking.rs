//! Account linking: what happens when a sign-in collides with an existing
//! account by email, plus manual link/unlink from account settings.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use crate::identity::{ConsentPrompt, FederatedIdentity, InteractiveSignIn};
use crate::models::account::{normalize_email, Account, NewIdentity, PendingCredential};
use crate::models::sign_in_method::{preferred_federated, SignInMethod};
use crate::repositories::{AttachResult, CredentialStore, DetachResult};
use crate::services::AuthError;
use crate::utils::password::hash_password_blocking;
use crate::validation::rules;

/// Proposal shown to the user before a confirmatory sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LinkOffer {
    pub email: String,
    /// Method the user must sign in with to prove ownership.
    pub existing_method: SignInMethod,
    /// Method that will be attached afterwards.
    pub new_method: SignInMethod,
}

/// Decision for a colliding email, before any user interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkPlan {
    AccountExists,
    RequiresManualLink,
    Offer(LinkOffer),
}

#[derive(Debug, Clone)]
pub enum LinkOutcome {
    Linked(Account),
    AlreadyLinked(Account),
}

impl LinkOutcome {
    pub fn account(&self) -> &Account {
        match self {
            LinkOutcome::Linked(account) | LinkOutcome::AlreadyLinked(account) => account,
        }
    }

    pub fn into_account(self) -> Account {
        match self {
            LinkOutcome::Linked(account) | LinkOutcome::AlreadyLinked(account) => account,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkOutcome::Linked(_) => "linked",
            LinkOutcome::AlreadyLinked(_) => "already_linked",
        }
    }
}

#[derive(Clone)]
pub struct LinkingNegotiator {
    store: Arc<dyn CredentialStore>,
}

impl LinkingNegotiator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub async fn plan(&self, email: &str, new_method: SignInMethod) -> Result<LinkPlan, AuthError> {
        let email = normalize_email(email);
        let methods = self.store.methods_for_email(&email).await?;

        if methods.is_empty() {
            return Ok(LinkPlan::AccountExists);
        }
        if methods.contains(&SignInMethod::Password) {
            return Ok(LinkPlan::RequiresManualLink);
        }
        Ok(match preferred_federated(&methods) {
            Some(existing_method) => LinkPlan::Offer(LinkOffer {
                email,
                existing_method,
                new_method,
            }),
            None => LinkPlan::AccountExists,
        })
    }

    /// Runs the full handshake for a credential that collided by email.
    pub async fn negotiate(
        &self,
        pending: PendingCredential,
        interactive: &dyn InteractiveSignIn,
        consent: &dyn ConsentPrompt,
    ) -> Result<LinkOutcome, AuthError> {
        let offer = match self.plan(&pending.email, pending.method()).await? {
            LinkPlan::AccountExists => return Err(AuthError::AccountExists),
            LinkPlan::RequiresManualLink => {
                tracing::info!(
                    email = %pending.email,
                    new_method = pending.method().as_str(),
                    "Link requires password sign-in first"
                );
                return Err(AuthError::RequiresManualLink);
            }
            LinkPlan::Offer(offer) => offer,
        };

        if !consent.confirm_link(&offer).await? {
            tracing::info!(email = %offer.email, "Link offer declined");
            return Err(AuthError::CancelledByUser);
        }

        let confirmed = interactive.sign_in(offer.existing_method).await?;
        let account = self
            .store
            .find_by_identity(confirmed.method, &confirmed.subject)
            .await?;
        let account = match account {
            Some(account)
                if account.email == offer.email
                    && normalize_email(&confirmed.email) == offer.email =>
            {
                account
            }
            other => {
                tracing::error!(
                    expected_email = %offer.email,
                    provider_email = %confirmed.email,
                    method = confirmed.method.as_str(),
                    resolved_account = ?other.map(|a| a.id),
                    "Confirmatory sign-in resolved to a different account"
                );
                return Err(AuthError::InconsistentAccount);
            }
        };

        self.attach(account, &pending.identity).await
    }

    /// Attaches a federated identity to a signed-in account.
    pub async fn link_method(
        &self,
        account: &Account,
        identity: FederatedIdentity,
    ) -> Result<LinkOutcome, AuthError> {
        if !identity.method.is_federated() {
            return Err(AuthError::InvalidInput(
                "Use the password endpoint to add a password".into(),
            ));
        }
        if account.has_method(identity.method) {
            return Ok(LinkOutcome::AlreadyLinked(account.clone()));
        }
        let identity = NewIdentity::federated(identity.method, identity.subject);
        self.attach(account.clone(), &identity).await
    }

    pub async fn set_password(
        &self,
        account: &Account,
        password: &str,
    ) -> Result<LinkOutcome, AuthError> {
        rules::validate_password_strength(password).map_err(|e| {
            AuthError::InvalidInput(
                e.message
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Password is too weak".into()),
            )
        })?;
        if account.has_password() {
            return Ok(LinkOutcome::AlreadyLinked(account.clone()));
        }
        let hash = hash_password_blocking(password.to_string()).await?;
        let identity = NewIdentity::password(&account.email, hash);
        self.attach(account.clone(), &identity).await
    }

    /// Removes a method. The last remaining method can never be removed.
    pub async fn unlink_method(
        &self,
        account: &Account,
        method: SignInMethod,
    ) -> Result<Account, AuthError> {
        if account.methods.len() <= 1 {
            return Err(AuthError::LastSignInMethod);
        }
        if !account.has_method(method) {
            return Err(AuthError::MethodNotLinked(method));
        }
        // The snapshot may be stale; the store re-checks under its own lock.
        match self.store.detach_identity(account.id, method).await? {
            DetachResult::Detached => {}
            DetachResult::NotLinked => return Err(AuthError::MethodNotLinked(method)),
            DetachResult::LastMethod => return Err(AuthError::LastSignInMethod),
        }

        tracing::info!(
            account_id = %account.id,
            method = method.as_str(),
            "Sign-in method unlinked"
        );
        let mut account = account.clone();
        account.methods.retain(|m| *m != method);
        Ok(account)
    }

    async fn attach(
        &self,
        mut account: Account,
        identity: &NewIdentity,
    ) -> Result<LinkOutcome, AuthError> {
        match self.store.attach_identity(account.id, identity).await? {
            AttachResult::Attached => {
                tracing::info!(
                    account_id = %account.id,
                    method = identity.method.as_str(),
                    "Sign-in method linked"
                );
                if !account.has_method(identity.method) {
                    account.methods.push(identity.method);
                    account.methods.sort();
                }
                Ok(LinkOutcome::Linked(account))
            }
            AttachResult::AlreadyLinked => Ok(LinkOutcome::AlreadyLinked(account)),
            AttachResult::InUseByOtherAccount => {
                tracing::warn!(
                    account_id = %account.id,
                    method = identity.method.as_str(),
                    "Credential belongs to another account"
                );
                Err(AuthError::CredentialInUse)
            }
        }
    }
}
