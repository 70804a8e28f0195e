//! Authentication data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// JWT claims carried by the session token
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct Claims {
    pub user_id: String,
    pub exp: usize,
}

/// User database model
///
/// email is the natural key for identity reconciliation across auth
/// methods; password_hash holds a random placeholder for federated-only
/// accounts.
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub profile_picture: Option<String>,
    pub is_verified: bool,
    pub auth_provider: String,
    pub created_at: Option<String>,
}

/// One-time-password record. Valid only while the code matches and the
/// expiry has not passed.
#[derive(FromRow, Debug, Clone)]
pub struct OtpRecord {
    pub id: i64,
    pub email: String,
    pub otp: String,
    pub created_at: String,
    pub expires_at: String,
}

// ---- Request payloads ----

#[derive(Deserialize, Debug)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize, Debug)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

#[derive(Deserialize, Debug)]
pub struct ResendOtpQuery {
    pub email: String,
}
