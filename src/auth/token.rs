//! Session token issuance and verification
//!
//! Tokens are stateless: validity is decided entirely by signature and
//! expiry. There is no refresh mechanism or revocation list; expiry
//! forces re-login.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::warn;

use super::models::Claims;
use crate::common::ApiError;

/// Default session lifetime in minutes
pub const DEFAULT_TTL_MINUTES: i64 = 30;

/// Issue a signed session token for the subject user
pub fn issue_token(user_id: &str, secret: &str, ttl_minutes: i64) -> Result<String, ApiError> {
    let exp = (Utc::now() + Duration::minutes(ttl_minutes)).timestamp() as usize;
    let claims = Claims {
        user_id: user_id.to_string(),
        exp,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::InternalServer(format!("jwt encoding failed: {}", e)))
}

/// Verify a session token. Signature, malformed and expired failures are
/// all reported uniformly as unauthenticated.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        warn!(error = %e, "Session token validation failed");
        ApiError::Unauthorized("invalid token".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test_secret_key";

    #[test]
    fn test_token_round_trip() {
        let token = issue_token("U_K7NP3X", SECRET, DEFAULT_TTL_MINUTES).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.user_id, "U_K7NP3X");
    }

    #[test]
    fn test_verify_fails_with_wrong_secret() {
        let token = issue_token("U_K7NP3X", SECRET, DEFAULT_TTL_MINUTES).unwrap();
        assert!(verify_token(&token, "wrong_secret").is_err());
    }

    #[test]
    fn test_verify_fails_when_expired() {
        // Expiry far enough in the past to clear the default validation leeway
        let claims = Claims {
            user_id: "U_K7NP3X".to_string(),
            exp: (chrono::Utc::now() - chrono::Duration::minutes(5)).timestamp() as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(verify_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_verify_fails_on_malformed_token() {
        assert!(verify_token("not.a.jwt", SECRET).is_err());
    }
}
