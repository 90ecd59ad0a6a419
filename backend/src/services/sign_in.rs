//! Sign-in attempts for every method, with collision detection by email.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use validator::Validate;

use crate::identity::{ConsentPrompt, FederatedIdentity, InteractiveSignIn};
use crate::models::account::{
    display_name_or_email, normalize_email, Account, AccountRole, LoginRequest, NewIdentity,
    PendingCredential, RegisterPayload,
};
use crate::models::sign_in_method::SignInMethod;
use crate::repositories::CredentialStore;
use crate::services::linking::LinkingNegotiator;
use crate::services::AuthError;
use crate::utils::password::{equalize_timing, hash_password_blocking, verify_password_blocking};

/// First half of a sign-in: either done, or blocked on linking.
#[derive(Debug, Clone)]
pub enum SignInAttempt {
    SignedIn(Account),
    /// The email belongs to an account that lacks this method.
    Collision(PendingCredential),
}

#[derive(Clone)]
pub struct SignInHandler {
    store: Arc<dyn CredentialStore>,
    negotiator: LinkingNegotiator,
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
    admin_emails: Vec<String>,
}

impl SignInHandler {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        negotiator: LinkingNegotiator,
        admin_emails: Vec<String>,
        attempts_per_minute: u32,
    ) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(attempts_per_minute).unwrap_or(NonZeroU32::MIN));
        Self::with_quota(store, negotiator, admin_emails, quota)
    }

    fn with_quota(
        store: Arc<dyn CredentialStore>,
        negotiator: LinkingNegotiator,
        admin_emails: Vec<String>,
        quota: Quota,
    ) -> Self {
        Self {
            store,
            negotiator,
            limiter: Arc::new(RateLimiter::keyed(quota)),
            admin_emails,
        }
    }

    pub fn negotiator(&self) -> &LinkingNegotiator {
        &self.negotiator
    }

    /// Forgets emails whose login quota has fully replenished.
    pub fn prune_rate_limits(&self) {
        prune(&self.limiter);
    }

    /// Prunes the limiter every `period` until the handler is dropped.
    pub fn spawn_rate_limit_pruning(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::downgrade(&self.limiter);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                prune(&limiter);
            }
        })
    }

    fn role_for(&self, email: &str) -> AccountRole {
        let email = normalize_email(email);
        if self.admin_emails.iter().any(|admin| *admin == email) {
            AccountRole::Admin
        } else {
            AccountRole::Visitor
        }
    }

    pub async fn sign_in_with_password(&self, request: &LoginRequest) -> Result<Account, AuthError> {
        request.validate()?;
        let email = normalize_email(&request.email);

        if self.limiter.check_key(&email).is_err() {
            tracing::warn!(email = %email, "Password sign-in rate limited");
            return Err(AuthError::RateLimited);
        }

        let hash = self
            .store
            .find_password_identity(&email)
            .await?
            .and_then(|identity| identity.password_hash);
        let Some(hash) = hash else {
            let password = request.password.clone();
            let _ = tokio::task::spawn_blocking(move || equalize_timing(&password)).await;
            tracing::info!(email = %email, "Password sign-in for unknown credential");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password_blocking(request.password.clone(), hash).await? {
            tracing::info!(email = %email, "Password sign-in rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let account = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        tracing::info!(account_id = %account.id, method = "password", "Signed in");
        Ok(account)
    }

    /// Runs the provider sign-in and upserts by email.
    ///
    /// A collision is reported before anything is created, so one email never
    /// ends up with two accounts.
    pub async fn attempt_federated(
        &self,
        method: SignInMethod,
        interactive: &dyn InteractiveSignIn,
    ) -> Result<SignInAttempt, AuthError> {
        if !method.is_federated() {
            return Err(AuthError::InvalidInput(format!(
                "{} is not a federated sign-in method",
                method.display_name()
            )));
        }
        let identity = interactive.sign_in(method).await?;
        self.upsert_federated(identity).await
    }

    async fn upsert_federated(&self, identity: FederatedIdentity) -> Result<SignInAttempt, AuthError> {
        if let Some(mut account) = self
            .store
            .find_by_identity(identity.method, &identity.subject)
            .await?
        {
            if let Some(name) = identity
                .display_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty() && *name != account.display_name)
            {
                self.store.update_display_name(account.id, name).await?;
                account.display_name = name.to_string();
            }
            tracing::info!(
                account_id = %account.id,
                method = identity.method.as_str(),
                "Signed in"
            );
            return Ok(SignInAttempt::SignedIn(account));
        }

        let email = normalize_email(&identity.email);
        let methods = self.store.methods_for_email(&email).await?;
        if !methods.is_empty() {
            tracing::info!(
                email = %email,
                attempted = identity.method.as_str(),
                "Sign-in collides with an existing account"
            );
            return Ok(SignInAttempt::Collision(identity.into_pending()));
        }

        let display_name = display_name_or_email(identity.display_name.as_deref(), &email);
        let account = Account::new(&email, &display_name, self.role_for(&email));
        let created = self
            .store
            .create_account(
                &account,
                &NewIdentity::federated(identity.method, identity.subject),
            )
            .await?;
        tracing::info!(
            account_id = %created.id,
            method = identity.method.as_str(),
            "Account created"
        );
        Ok(SignInAttempt::SignedIn(created))
    }

    pub async fn sign_in_federated(
        &self,
        method: SignInMethod,
        interactive: &dyn InteractiveSignIn,
        consent: &dyn ConsentPrompt,
    ) -> Result<Account, AuthError> {
        match self.attempt_federated(method, interactive).await? {
            SignInAttempt::SignedIn(account) => Ok(account),
            SignInAttempt::Collision(pending) => self
                .negotiator
                .negotiate(pending, interactive, consent)
                .await
                .map(|outcome| outcome.into_account()),
        }
    }

    /// Creates a password account, or reports a collision for the linking flow.
    pub async fn attempt_registration(
        &self,
        payload: &RegisterPayload,
    ) -> Result<SignInAttempt, AuthError> {
        payload.validate()?;
        let email = normalize_email(&payload.email);
        let hash = hash_password_blocking(payload.password.clone()).await?;
        let identity = NewIdentity::password(&email, hash);

        if !self.store.methods_for_email(&email).await?.is_empty() {
            tracing::info!(email = %email, "Registration collides with an existing account");
            return Ok(SignInAttempt::Collision(PendingCredential::new(
                identity,
                &email,
                Some(payload.display_name.trim().to_string()),
            )));
        }

        let account = Account::new(&email, &payload.display_name, self.role_for(&email));
        let created = self.store.create_account(&account, &identity).await?;
        tracing::info!(account_id = %created.id, method = "password", "Account created");
        Ok(SignInAttempt::SignedIn(created))
    }

    pub async fn register_with_password(
        &self,
        payload: &RegisterPayload,
        interactive: &dyn InteractiveSignIn,
        consent: &dyn ConsentPrompt,
    ) -> Result<Account, AuthError> {
        match self.attempt_registration(payload).await? {
            SignInAttempt::SignedIn(account) => Ok(account),
            SignInAttempt::Collision(pending) => self
                .negotiator
                .negotiate(pending, interactive, consent)
                .await
                .map(|outcome| outcome.into_account()),
        }
    }
}

fn prune(limiter: &DefaultKeyedRateLimiter<String>) {
    let before = limiter.len();
    limiter.retain_recent();
    limiter.shrink_to_fit();
    let after = limiter.len();
    if after < before {
        tracing::debug!(pruned = before - after, remaining = after, "Pruned login rate limits");
    }
}
