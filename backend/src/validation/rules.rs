//! Common validation rules shared across request payloads.

use validator::ValidationError;

use crate::models::account::{ChangePasswordRequest, RegisterPayload};
use crate::models::book::BOOK_CATEGORIES;

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Validates password length.
///
/// Requirements:
/// - At least 6 characters
/// - At most 128 characters
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        let mut err = ValidationError::new("password_too_short");
        err.message = Some("Password must be at least 6 characters".into());
        return Err(err);
    }
    if length > 128 {
        return Err(ValidationError::new("password_too_long"));
    }
    Ok(())
}

pub fn validate_password_confirmation(payload: &RegisterPayload) -> Result<(), ValidationError> {
    passwords_match(&payload.password, &payload.confirm_password)
}

pub fn validate_new_password_confirmation(
    payload: &ChangePasswordRequest,
) -> Result<(), ValidationError> {
    passwords_match(&payload.new_password, &payload.confirm_password)
}

fn passwords_match(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password != confirmation {
        let mut err = ValidationError::new("password_mismatch");
        err.message = Some("Passwords do not match".into());
        return Err(err);
    }
    Ok(())
}

/// Validates that a category is one of the listed book categories.
pub fn validate_book_category(category: &str) -> Result<(), ValidationError> {
    if BOOK_CATEGORIES.contains(&category) {
        return Ok(());
    }
    let mut err = ValidationError::new("unknown_category");
    err.message = Some(format!("Unknown category: {category}").into());
    Err(err)
}

/// Rejects values that are empty once trimmed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_rejects_short() {
        assert!(validate_password_strength("12345").is_err());
    }

    #[test]
    fn password_accepts_six_characters() {
        assert!(validate_password_strength("123456").is_ok());
    }

    #[test]
    fn password_counts_characters_not_bytes() {
        assert!(validate_password_strength("ñññññ").is_err());
        assert!(validate_password_strength("ññññññ").is_ok());
    }

    #[test]
    fn category_must_be_listed() {
        assert!(validate_book_category("Poetry").is_ok());
        assert!(validate_book_category("Cookbooks").is_err());
    }

    #[test]
    fn blank_values_are_rejected() {
        assert!(validate_not_blank("   ").is_err());
        assert!(validate_not_blank(" x ").is_ok());
    }
}
