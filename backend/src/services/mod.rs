//! Domain services: sign-in, account linking, session logging and the
//! marketplace content they protect.

use serde_json::Value;
use thiserror::Error;

use crate::models::sign_in_method::SignInMethod;

pub mod books;
pub mod linking;
pub mod opinions;
pub mod password_reset;
pub mod pending_link;
pub mod session_export;
pub mod session_recorder;
pub mod sign_in;

/// Failures of the authentication and linking flows.
///
/// Everything except [`AuthError::InconsistentAccount`] is recoverable and
/// carries a message the user can act on.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("An account already exists for this email")]
    AccountExists,
    #[error("This email is registered with a password. Sign in with your password first, then link the new method from your account settings")]
    RequiresManualLink,
    #[error("Sign-in was cancelled")]
    CancelledByUser,
    #[error("This credential is already linked to another account")]
    CredentialInUse,
    #[error("Cannot remove the only sign-in method of an account")]
    LastSignInMethod,
    #[error("{} is not linked to this account", .0.display_name())]
    MethodNotLinked(SignInMethod),
    #[error("The reset link is invalid or has expired")]
    InvalidResetToken,
    #[error("Too many attempts, try again later")]
    RateLimited,
    #[error("The provider signed in to a different account than expected")]
    InconsistentAccount,
    #[error("Authentication backend is unavailable")]
    BackendUnavailable(#[source] anyhow::Error),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidInput(_) => "INVALID_INPUT",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::AccountExists => "ACCOUNT_EXISTS",
            AuthError::RequiresManualLink => "REQUIRES_MANUAL_LINK",
            AuthError::CancelledByUser => "CANCELLED_BY_USER",
            AuthError::CredentialInUse => "CREDENTIAL_IN_USE",
            AuthError::LastSignInMethod => "LAST_SIGN_IN_METHOD",
            AuthError::MethodNotLinked(_) => "METHOD_NOT_LINKED",
            AuthError::InvalidResetToken => "INVALID_RESET_TOKEN",
            AuthError::RateLimited => "RATE_LIMITED",
            AuthError::InconsistentAccount => "INCONSISTENT_ACCOUNT",
            AuthError::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            AuthError::RequiresManualLink => Some(serde_json::json!({
                "sign_in_with": SignInMethod::Password,
            })),
            AuthError::MethodNotLinked(method) => Some(serde_json::json!({ "method": method })),
            _ => None,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AuthError::InconsistentAccount)
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::BackendUnavailable(err)
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect::<Vec<_>>()
            .join("; ");
        AuthError::InvalidInput(message)
    }
}
