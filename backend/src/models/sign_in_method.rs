//! Sign-in methods an account can have linked.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// A way of authenticating into an account.
///
/// Variant order is significant: `Ord` follows declaration order, so a sorted
/// collection of methods lists the password first and then the federated
/// providers in linking preference order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum SignInMethod {
    /// Email + password credential.
    Password,
    /// Google OAuth.
    Google,
    /// Facebook OAuth.
    Facebook,
    /// GitHub OAuth.
    GitHub,
}

/// Federated providers in the order the linking negotiator prefers them when
/// choosing an existing method to re-authenticate with.
pub const FEDERATED_PREFERENCE: [SignInMethod; 3] = [
    SignInMethod::Google,
    SignInMethod::Facebook,
    SignInMethod::GitHub,
];

impl SignInMethod {
    pub const ALL: [SignInMethod; 4] = [
        SignInMethod::Password,
        SignInMethod::Google,
        SignInMethod::Facebook,
        SignInMethod::GitHub,
    ];

    /// Canonical lowercase identifier, as stored and sent over the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignInMethod::Password => "password",
            SignInMethod::Google => "google",
            SignInMethod::Facebook => "facebook",
            SignInMethod::GitHub => "github",
        }
    }

    /// Human readable name used in messages and exports.
    pub fn display_name(&self) -> &'static str {
        match self {
            SignInMethod::Password => "Email",
            SignInMethod::Google => "Google",
            SignInMethod::Facebook => "Facebook",
            SignInMethod::GitHub => "GitHub",
        }
    }

    pub fn is_federated(&self) -> bool {
        !matches!(self, SignInMethod::Password)
    }
}

impl fmt::Display for SignInMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSignInMethod(pub String);

impl fmt::Display for UnknownSignInMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported sign-in method: {}", self.0)
    }
}

impl std::error::Error for UnknownSignInMethod {}

impl FromStr for SignInMethod {
    type Err = UnknownSignInMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "password" | "email" => Ok(SignInMethod::Password),
            // provider ids issued by hosted identity platforms
            "google" | "google.com" => Ok(SignInMethod::Google),
            "facebook" | "facebook.com" => Ok(SignInMethod::Facebook),
            "github" | "github.com" => Ok(SignInMethod::GitHub),
            _ => Err(UnknownSignInMethod(s.to_string())),
        }
    }
}

impl Serialize for SignInMethod {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SignInMethod {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SignInMethod::from_str(&s).map_err(|_| {
            serde::de::Error::unknown_variant(&s, &["password", "google", "facebook", "github"])
        })
    }
}

/// Picks the first federated method from `linked` following [`FEDERATED_PREFERENCE`].
pub fn preferred_federated<'a, I>(linked: I) -> Option<SignInMethod>
where
    I: IntoIterator<Item = &'a SignInMethod>,
{
    let linked: Vec<SignInMethod> = linked.into_iter().copied().collect();
    FEDERATED_PREFERENCE
        .into_iter()
        .find(|candidate| linked.contains(candidate))
}
