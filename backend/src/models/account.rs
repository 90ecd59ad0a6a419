//! Models that represent accounts, their linked sign-in methods, and
//! authentication payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::sign_in_method::SignInMethod;
use crate::types::AccountId;
use crate::validation::rules;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// Database representation of an account. One account exists per email.
pub struct Account {
    pub id: AccountId,
    /// Lower-cased email; unique across every sign-in method.
    pub email: String,
    pub display_name: String,
    pub role: AccountRole,
    /// Linked sign-in methods, sorted in preference order. Loaded separately.
    #[sqlx(skip)]
    #[serde(default)]
    pub methods: Vec<SignInMethod>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(email: &str, display_name: &str, role: AccountRole) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            email: normalize_email(email),
            display_name: display_name.trim().to_string(),
            role,
            methods: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, AccountRole::Admin)
    }

    pub fn has_method(&self, method: SignInMethod) -> bool {
        self.methods.contains(&method)
    }

    pub fn has_password(&self) -> bool {
        self.has_method(SignInMethod::Password)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema, Default)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
/// Account roles stored in the database.
pub enum AccountRole {
    /// Regular marketplace user.
    #[default]
    Visitor,
    /// May browse session logs and moderate listings.
    Admin,
}

impl AccountRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Visitor => "visitor",
            AccountRole::Admin => "admin",
        }
    }
}

impl Serialize for AccountRole {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AccountRole {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.to_ascii_lowercase().as_str() {
            "visitor" | "user" => Ok(AccountRole::Visitor),
            "admin" => Ok(AccountRole::Admin),
            _ => Err(serde::de::Error::unknown_variant(&s, &["visitor", "admin"])),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
/// One sign-in method bound to an account.
pub struct LinkedIdentity {
    pub account_id: AccountId,
    pub method: SignInMethod,
    /// Provider user id, or the email for password identities.
    pub subject: String,
    pub password_hash: Option<String>,
    pub linked_at: DateTime<Utc>,
}

/// Identity data needed to bind a method to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIdentity {
    pub method: SignInMethod,
    pub subject: String,
    pub password_hash: Option<String>,
}

impl NewIdentity {
    pub fn password(email: &str, password_hash: String) -> Self {
        Self {
            method: SignInMethod::Password,
            subject: normalize_email(email),
            password_hash: Some(password_hash),
        }
    }

    pub fn federated(method: SignInMethod, subject: impl Into<String>) -> Self {
        Self {
            method,
            subject: subject.into(),
            password_hash: None,
        }
    }
}

/// A credential that collided with an existing account by email and is waiting
/// to be attached once the owner re-authenticates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCredential {
    pub identity: NewIdentity,
    pub email: String,
    pub display_name: Option<String>,
}

impl PendingCredential {
    pub fn new(identity: NewIdentity, email: &str, display_name: Option<String>) -> Self {
        Self {
            identity,
            email: normalize_email(email),
            display_name,
        }
    }

    pub fn method(&self) -> SignInMethod {
        self.identity.method
    }
}

/// Lower-cases and trims an email so it can be used as the account key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Falls back to the local part of the email when no display name is known.
pub fn display_name_or_email(display_name: Option<&str>, email: &str) -> String {
    match display_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => name.to_string(),
        None => email.split('@').next().unwrap_or(email).to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
/// Payload for creating an account with email and password.
#[validate(schema(function = "rules::validate_password_confirmation"))]
pub struct RegisterPayload {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(custom(function = "rules::validate_password_strength"))]
    pub password: String,
    pub confirm_password: String,
    #[validate(length(min = 1, max = 100, message = "Display name is required"))]
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
/// Credentials submitted by a user signing in with email and password.
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
/// Query parameters the OAuth provider appended to the redirect URI.
pub struct OAuthCallbackPayload {
    #[serde(default)]
    pub code: String,
    pub state: String,
    /// Set by the provider when the user denied access.
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
/// Second step of the linking handshake.
pub struct LinkConfirmPayload {
    /// Token returned with the `LINK_REQUIRED` response.
    pub pending_token: String,
    /// Whether the user agreed to link the new method.
    pub accept: bool,
    /// Authorization code from the existing provider, required when accepting.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
/// Adds a password method to the signed-in account.
pub struct SetPasswordPayload {
    #[validate(custom(function = "rules::validate_password_strength"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
/// Payload submitted when a user changes their password.
#[validate(schema(function = "rules::validate_new_password_confirmation"))]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(custom(function = "rules::validate_password_strength"))]
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Public-facing representation of an account.
pub struct AccountResponse {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub methods: Vec<SignInMethod>,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        AccountResponse {
            id: account.id.to_string(),
            email: account.email,
            display_name: account.display_name,
            role: account.role.as_str().to_string(),
            methods: account.methods,
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Access token returned after a successful sign-in.
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub session_id: String,
    pub account: AccountResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_emails() {
        assert_eq!(normalize_email("  Reader@Example.COM "), "reader@example.com");
    }

    #[test]
    fn display_name_falls_back_to_local_part() {
        assert_eq!(display_name_or_email(None, "ana@example.com"), "ana");
        assert_eq!(display_name_or_email(Some("  "), "ana@example.com"), "ana");
        assert_eq!(display_name_or_email(Some("Ana"), "ana@example.com"), "Ana");
    }

    #[test]
    fn role_deserialization_is_case_insensitive() {
        let role: AccountRole = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(role, AccountRole::Admin);
        assert!(serde_json::from_str::<AccountRole>("\"owner\"").is_err());
    }

    #[test]
    fn register_payload_requires_matching_confirmation() {
        let payload = RegisterPayload {
            email: "reader@example.com".into(),
            password: "secret1".into(),
            confirm_password: "secret2".into(),
            display_name: "Reader".into(),
        };
        assert!(payload.validate().is_err());

        let payload = RegisterPayload {
            confirm_password: "secret1".into(),
            ..payload
        };
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn register_payload_rejects_short_passwords() {
        let payload = RegisterPayload {
            email: "reader@example.com".into(),
            password: "12345".into(),
            confirm_password: "12345".into(),
            display_name: "Reader".into(),
        };
        assert!(payload.validate().is_err());
    }
}
