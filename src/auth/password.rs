//! Password hashing and strength validation

use thiserror::Error;

use crate::common::ApiError;

/// Symbols accepted by the strength policy
const ALLOWED_SYMBOLS: &str = "@$!%*?&";

/// First unmet password strength rule
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WeakPassword {
    #[error("Password must be at least 8 characters long")]
    TooShort,
    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,
    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,
    #[error("Password must contain at least one digit")]
    MissingDigit,
    #[error("Password must contain at least one special character (@$!%*?&)")]
    MissingSymbol,
}

impl From<WeakPassword> for ApiError {
    fn from(e: WeakPassword) -> Self {
        ApiError::ValidationError(e.to_string())
    }
}

/// Validate password strength. Rules are checked in order and the first
/// unmet rule is reported.
pub fn validate_password_strength(password: &str) -> Result<(), WeakPassword> {
    if password.chars().count() < 8 {
        return Err(WeakPassword::TooShort);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(WeakPassword::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(WeakPassword::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(WeakPassword::MissingDigit);
    }
    if !password.chars().any(|c| ALLOWED_SYMBOLS.contains(c)) {
        return Err(WeakPassword::MissingSymbol);
    }
    Ok(())
}

/// Hash a password with bcrypt at the given cost factor
pub fn hash_password(password: &str, cost: u32) -> Result<String, ApiError> {
    bcrypt::hash(password, cost)
        .map_err(|e| ApiError::InternalServer(format!("password hashing failed: {}", e)))
}

/// Verify a password against a stored bcrypt digest. A malformed digest
/// is treated as a non-match.
pub fn verify_password(password: &str, digest: &str) -> bool {
    bcrypt::verify(password, digest).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low cost keeps the test suite fast; production cost comes from config
    const TEST_COST: u32 = 4;

    #[test]
    fn test_strength_reports_first_unmet_rule() {
        assert_eq!(
            validate_password_strength("Ab1@"),
            Err(WeakPassword::TooShort)
        );
        assert_eq!(
            validate_password_strength("alllower1@"),
            Err(WeakPassword::MissingUppercase)
        );
        assert_eq!(
            validate_password_strength("ALLUPPER1@"),
            Err(WeakPassword::MissingLowercase)
        );
        assert_eq!(
            validate_password_strength("NoDigits@@"),
            Err(WeakPassword::MissingDigit)
        );
        assert_eq!(
            validate_password_strength("NoSymbol11"),
            Err(WeakPassword::MissingSymbol)
        );
    }

    #[test]
    fn test_strength_accepts_compliant_password() {
        assert!(validate_password_strength("Str0ng@pass").is_ok());
    }

    #[test]
    fn test_hash_verify_round_trip() {
        let digest = hash_password("Str0ng@pass", TEST_COST).unwrap();
        assert!(verify_password("Str0ng@pass", &digest));
        assert!(!verify_password("Wr0ng@pass", &digest));
    }

    #[test]
    fn test_verify_rejects_malformed_digest() {
        assert!(!verify_password("Str0ng@pass", "not-a-bcrypt-digest"));
    }
}
