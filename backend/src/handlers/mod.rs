pub mod accounts;
pub mod admin;
pub mod auth;
pub mod books;
pub mod opinions;
pub mod password_reset;
pub mod sessions;

pub use accounts::*;
pub use auth::*;
pub use books::*;
pub use opinions::*;
pub use password_reset::*;
pub use sessions::*;

use std::str::FromStr;

use crate::{error::AppError, models::sign_in_method::SignInMethod};

/// Parses a `{provider}` path segment; only federated providers are accepted.
pub(crate) fn federated_provider(raw: &str) -> Result<SignInMethod, AppError> {
    match SignInMethod::from_str(raw) {
        Ok(method) if method.is_federated() => Ok(method),
        _ => Err(AppError::BadRequest(format!("Unsupported provider: {}", raw))),
    }
}

pub(crate) fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid {} ID", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_federated_providers_are_routable() {
        assert_eq!(federated_provider("github").ok(), Some(SignInMethod::GitHub));
        assert!(federated_provider("password").is_err());
        assert!(federated_provider("myspace").is_err());
    }
}
