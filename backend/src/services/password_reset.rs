//! Password reset by email link and password change for signed-in accounts.

use std::sync::Arc;

use chrono::{Duration, Utc};
use validator::Validate;

use crate::models::account::{normalize_email, Account, ChangePasswordRequest};
use crate::models::password_reset::{
    PasswordReset, RequestPasswordResetPayload, ResetPasswordPayload,
};
use crate::models::sign_in_method::SignInMethod;
use crate::repositories::password_reset::hash_token;
use crate::repositories::{CredentialStore, PasswordResetStore};
use crate::services::AuthError;
use crate::utils::email::Mailer;
use crate::utils::password::{hash_password_blocking, verify_password_blocking};
use crate::utils::token::random_token;

pub const RESET_TOKEN_TTL_HOURS: i64 = 1;

#[derive(Clone)]
pub struct PasswordResetService {
    resets: Arc<dyn PasswordResetStore>,
    credentials: Arc<dyn CredentialStore>,
    mailer: Arc<dyn Mailer>,
}

impl PasswordResetService {
    pub fn new(
        resets: Arc<dyn PasswordResetStore>,
        credentials: Arc<dyn CredentialStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            resets,
            credentials,
            mailer,
        }
    }

    /// Issues a reset link when the email belongs to a password account.
    ///
    /// Succeeds either way so the response does not reveal which emails exist.
    pub async fn request_reset(&self, payload: &RequestPasswordResetPayload) -> Result<(), AuthError> {
        payload.validate()?;
        let email = normalize_email(&payload.email);

        let account = match self.credentials.find_by_email(&email).await? {
            Some(account) if account.has_password() => account,
            _ => {
                tracing::info!(email = %email, "Password reset requested for non-password email");
                return Ok(());
            }
        };

        let token = random_token();
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);
        self.resets
            .create(account.id, &hash_token(&token), expires_at)
            .await?;
        if let Err(err) = self.mailer.send_password_reset(&account.email, &token).await {
            tracing::error!(account_id = %account.id, error = %err, "Failed to send reset email");
        } else {
            tracing::info!(account_id = %account.id, "Password reset email sent");
        }
        Ok(())
    }

    async fn redeemable(&self, token: &str) -> Result<(PasswordReset, Account), AuthError> {
        let reset = self
            .resets
            .find_by_token_hash(&hash_token(token))
            .await?
            .filter(|reset| reset.is_redeemable(Utc::now()))
            .ok_or(AuthError::InvalidResetToken)?;
        // Tokens are void once the password method is gone.
        let account = self
            .credentials
            .find_by_id(reset.account_id)
            .await?
            .filter(Account::has_password)
            .ok_or(AuthError::InvalidResetToken)?;
        Ok((reset, account))
    }

    /// Email of the account a valid, unused, unexpired token belongs to.
    pub async fn verify_reset(&self, token: &str) -> Result<String, AuthError> {
        let (_, account) = self.redeemable(token).await?;
        Ok(account.email)
    }

    pub async fn confirm_reset(&self, payload: &ResetPasswordPayload) -> Result<(), AuthError> {
        payload.validate()?;
        let (reset, account) = self.redeemable(&payload.token).await?;

        // claim the token first so concurrent redemptions cannot both succeed
        if !self.resets.mark_used(reset.id, Utc::now()).await? {
            return Err(AuthError::InvalidResetToken);
        }
        let hash = hash_password_blocking(payload.new_password.clone()).await?;
        if !self.credentials.set_password_hash(account.id, &hash).await? {
            tracing::warn!(account_id = %account.id, "Password unlinked during reset");
            return Err(AuthError::MethodNotLinked(SignInMethod::Password));
        }
        tracing::info!(account_id = %account.id, "Password reset completed");

        self.notify_changed(&account).await;
        Ok(())
    }

    pub async fn change_password(
        &self,
        account: &Account,
        request: &ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        request.validate()?;
        let hash = self
            .credentials
            .find_password_identity(&account.email)
            .await?
            .and_then(|identity| identity.password_hash)
            .ok_or(AuthError::MethodNotLinked(SignInMethod::Password))?;

        if !verify_password_blocking(request.current_password.clone(), hash).await? {
            return Err(AuthError::InvalidCredentials);
        }
        let new_hash = hash_password_blocking(request.new_password.clone()).await?;
        if !self
            .credentials
            .set_password_hash(account.id, &new_hash)
            .await?
        {
            return Err(AuthError::MethodNotLinked(SignInMethod::Password));
        }
        tracing::info!(account_id = %account.id, "Password changed");

        self.notify_changed(account).await;
        Ok(())
    }

    async fn notify_changed(&self, account: &Account) {
        if let Err(err) = self
            .mailer
            .send_password_changed(&account.email, &account.display_name)
            .await
        {
            tracing::warn!(account_id = %account.id, error = %err, "Failed to send password-changed email");
        }
    }
}
