//! Authentication routes

use axum::{
    routing::{get, post, put},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /auth/register` - Register with email-OTP verification
/// - `POST /auth/verify-email` - Confirm a verification OTP
/// - `POST /auth/login` - Password login, sets the session cookie
/// - `POST /auth/verify-resend-otp` - Re-issue a verification OTP
/// - `POST /auth/forgot-password` - Send a password-reset OTP
/// - `PUT /auth/reset-password` - Reset password with an OTP
/// - `POST /auth/logout` - Clear the session cookie
/// - `GET /auth/google/login` - Redirect to the Google consent screen
/// - `GET /auth/google/callback` - OAuth callback, sets the session cookie
pub fn auth_routes() -> Router {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/verify-email", post(handlers::verify_email))
        .route("/auth/login", post(handlers::login))
        .route("/auth/verify-resend-otp", post(handlers::resend_otp))
        .route("/auth/forgot-password", post(handlers::forgot_password))
        .route("/auth/reset-password", put(handlers::reset_password))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/google/login", get(handlers::google_login))
        .route("/auth/google/callback", get(handlers::google_callback))
}
