//! Authentication handlers: register/verify/login/logout, OTP resend,
//! password reset, and the Google OAuth login flows.

use axum::{
    extract::{Extension, Json, Multipart, Query},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::extractors::{extract_session_token, SESSION_COOKIE_NAME};
use super::models::{
    ForgotPasswordRequest, LoginRequest, ResendOtpQuery, ResetPasswordRequest, VerifyEmailRequest,
};
use super::otp::generate_otp;
use super::password::{hash_password, validate_password_strength, verify_password};
use super::repository;
use super::token::issue_token;
use crate::common::{generate_raw_id, safe_email_log, ApiError, AppState};
use crate::services::email::{password_reset_email, verification_email};

/// POST /auth/register
///
/// Multipart body: name, email, password, profile_picture. Creates an
/// unverified account and emails a verification OTP. Email delivery
/// failure is logged and swallowed; the user can request a resend.
pub async fn register(
    Extension(state): Extension<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut name: Option<String> = None;
    let mut email: Option<String> = None;
    let mut password: Option<String> = None;
    let mut picture: Option<(Vec<u8>, Option<String>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        match field.name().unwrap_or_default() {
            "name" => {
                name = Some(read_text_field(field).await?);
            }
            "email" => {
                email = Some(read_text_field(field).await?.trim().to_lowercase());
            }
            "password" => {
                password = Some(read_text_field(field).await?);
            }
            "profile_picture" => {
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {}", e)))?;
                picture = Some((data.to_vec(), content_type));
            }
            other => {
                debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    let name = name.ok_or_else(|| ApiError::ValidationError("name is required".to_string()))?;
    let email = email.ok_or_else(|| ApiError::ValidationError("email is required".to_string()))?;
    let password =
        password.ok_or_else(|| ApiError::ValidationError("password is required".to_string()))?;

    validate_email(&email)?;
    validate_password_strength(&password)?;

    if repository::find_user_by_email(&state.db, &email).await?.is_some() {
        info!(email = %safe_email_log(&email), "Registration rejected: email already taken");
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let password_hash = hash_password(&password, state.config.bcrypt_cost)?;

    let profile_ref = match picture {
        Some((data, content_type)) if !data.is_empty() => {
            Some(store_profile_image(&state, data, content_type.as_deref()).await?)
        }
        _ => None,
    };

    repository::create_user(&state.db, &name, &email, &password_hash, profile_ref.as_deref())
        .await?;

    let otp = generate_otp();
    repository::store_otp(&state.db, &email, &otp).await?;
    notify_otp(&state, &email, &otp, OtpPurpose::Verification).await;

    Ok(Json(serde_json::json!({
        "msg": "OTP sent for email verification"
    })))
}

/// POST /auth/verify-email
///
/// Requires an existing user and a matching, unexpired OTP. Consumed
/// codes are deleted so a verified code cannot be replayed.
pub async fn verify_email(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<VerifyEmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = payload.email.trim().to_lowercase();

    let user = repository::find_user_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let record = repository::consume_otp(&state.db, &email, &payload.otp).await?;
    if record.is_none() {
        return Err(ApiError::BadRequest("Invalid or expired OTP".to_string()));
    }

    repository::mark_user_verified(&state.db, &user).await?;
    repository::delete_otps_for_email(&state.db, &email).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "msg": "Email verified successfully" })),
    ))
}

/// POST /auth/login
///
/// Rejects when a valid session cookie already claims a user; otherwise
/// checks credentials and verification state, issues a token and sets
/// the session cookie.
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        // Invalid or expired cookies fall through to a fresh login
        if super::token::verify_token(&token, &state.config.jwt_secret).is_ok() {
            return Err(ApiError::BadRequest("User already logged in".to_string()));
        }
    }

    let email = payload.email.trim().to_lowercase();

    let user = repository::find_user_by_email(&state.db, &email).await?;
    let user = match user {
        Some(user) if verify_password(&payload.password, &user.password_hash) => user,
        _ => {
            info!(email = %safe_email_log(&email), "Login rejected: invalid credentials");
            return Err(ApiError::BadRequest("Invalid credentials".to_string()));
        }
    };

    if !user.is_verified {
        info!(user_id = %user.id, "Login rejected: email not verified");
        return Err(ApiError::Forbidden("Email not verified".to_string()));
    }

    let token = issue_token(
        &user.id,
        &state.config.jwt_secret,
        state.config.token_ttl_minutes,
    )?;

    info!(user_id = %user.id, email = %safe_email_log(&user.email), "Login successful");

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, session_cookie(&state, &token)?);

    Ok((
        response_headers,
        Json(serde_json::json!({
            "message": "Login successful",
            "access_token": token,
        })),
    ))
}

/// POST /auth/verify-resend-otp?email=
///
/// Issues a fresh OTP for an existing, still-unverified user,
/// overwriting the previous code.
pub async fn resend_otp(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<ResendOtpQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = query.email.trim().to_lowercase();

    let user = repository::find_user_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if user.is_verified {
        return Err(ApiError::BadRequest(
            "User is already verified".to_string(),
        ));
    }

    let otp = generate_otp();
    repository::update_otp(&state.db, &email, &otp).await?;
    notify_otp(&state, &email, &otp, OtpPurpose::Verification).await;

    Ok(Json(serde_json::json!({ "msg": "OTP sent successfully" })))
}

/// POST /auth/forgot-password
///
/// Email ownership is the only identity proof: a reset OTP is sent to
/// any registered address.
pub async fn forgot_password(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = payload.email.trim().to_lowercase();

    repository::find_user_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("Email not found".to_string()))?;

    let otp = generate_otp();
    repository::store_otp(&state.db, &email, &otp).await?;
    notify_otp(&state, &email, &otp, OtpPurpose::PasswordReset).await;

    Ok(Json(serde_json::json!({
        "msg": "OTP sent to your email for password reset"
    })))
}

/// PUT /auth/reset-password
pub async fn reset_password(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = payload.email.trim().to_lowercase();

    let record = repository::consume_otp(&state.db, &email, &payload.otp).await?;
    if record.is_none() {
        return Err(ApiError::BadRequest("Invalid or expired OTP".to_string()));
    }

    validate_password_strength(&payload.new_password)?;

    let new_hash = hash_password(&payload.new_password, state.config.bcrypt_cost)?;
    repository::update_user_password(&state.db, &email, &new_hash).await?;
    repository::delete_otps_for_email(&state.db, &email).await?;

    Ok(Json(serde_json::json!({
        "msg": "Password reset successfully"
    })))
}

/// POST /auth/logout
///
/// Stateless sessions: the token itself is not revoked, the cookie is
/// cleared unconditionally.
pub async fn logout(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, clear_session_cookie(&state)?);

    info!("User logout, session cookie cleared");

    Ok((
        response_headers,
        Json(serde_json::json!({ "msg": "Logout successful" })),
    ))
}

/// GET /auth/google/login - redirect to the provider consent screen
pub async fn google_login(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Redirect, ApiError> {
    let url = state.google_service.authorize_url()?;
    Ok(Redirect::to(&url))
}

/// GET /auth/google/callback?code=
///
/// Exchanges the authorization code for an identity assertion,
/// reconciles it against the local store and issues a session.
pub async fn google_callback(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let code = params
        .get("code")
        .ok_or_else(|| ApiError::BadRequest("Missing code".to_string()))?;

    let mut identity = state.google_service.exchange_code_for_identity(code).await?;

    // Email is the sole federation key; require the provider to have
    // verified it before linking or creating a local account.
    if !identity.email_verified {
        warn!(
            email = %safe_email_log(&identity.email),
            "OAuth callback rejected: provider email not verified"
        );
        return Err(ApiError::BadRequest(
            "Google account email is not verified".to_string(),
        ));
    }

    // Mirror the provider avatar into our own storage for accounts that
    // do not have a picture yet. Mirror failure keeps the provider URL.
    let existing = repository::find_user_by_email(&state.db, &identity.email).await?;
    let wants_avatar = existing.map_or(true, |u| u.profile_picture.is_none());
    if wants_avatar {
        if let Some(url) = identity.picture.clone() {
            match mirror_remote_avatar(&state, &url).await {
                Ok(stored) => identity.picture = Some(stored),
                Err(e) => warn!(error = %e, "Avatar mirror failed, keeping provider URL"),
            }
        }
    }

    let (user, outcome) =
        repository::get_or_create_google_user(&state.db, &identity, state.config.bcrypt_cost)
            .await?;

    debug!(user_id = %user.id, outcome = ?outcome, "Google identity reconciled");

    let token = issue_token(
        &user.id,
        &state.config.jwt_secret,
        state.config.token_ttl_minutes,
    )?;

    info!(user_id = %user.id, "Login successful via Google OAuth");

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, session_cookie(&state, &token)?);

    Ok((
        response_headers,
        Json(serde_json::json!({
            "message": "Google login successful",
            "access_token": token,
        })),
    ))
}

// ---- Helper Functions ----

enum OtpPurpose {
    Verification,
    PasswordReset,
}

/// Dispatch the OTP email. Delivery failure is logged and swallowed:
/// the preceding state change stands and the user can request a resend.
async fn notify_otp(state: &AppState, email: &str, otp: &str, purpose: OtpPurpose) {
    let (subject, body) = match purpose {
        OtpPurpose::Verification => verification_email(otp),
        OtpPurpose::PasswordReset => password_reset_email(otp),
    };

    if let Err(e) = state.aws_service.send_email(email, &subject, &body).await {
        error!(
            error = %e,
            email = %safe_email_log(email),
            "Failed to send OTP email; user must request a resend"
        );
    }
}

/// Minimal address shape check before anything hits the store: exactly
/// one `@`, non-empty local part, dotted domain, no whitespace.
pub(crate) fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ApiError::ValidationError(
            "email address is malformed".to_string(),
        ))
    }
}

/// Download a remote avatar and store it through the usual image path
async fn mirror_remote_avatar(state: &AppState, url: &str) -> Result<String, ApiError> {
    let response = state
        .http
        .get(url)
        .send()
        .await
        .map_err(|e| ApiError::Upstream(format!("avatar fetch failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Upstream(format!(
            "avatar fetch failed: HTTP {}",
            status
        )));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let data = response
        .bytes()
        .await
        .map_err(|e| ApiError::Upstream(format!("avatar fetch failed: {}", e)))?;

    store_profile_image(state, data.to_vec(), content_type.as_deref()).await
}

/// Validate and store an uploaded profile image, preferring S3 with a
/// local-disk fallback. Returns the stored reference.
pub(crate) async fn store_profile_image(
    state: &AppState,
    data: Vec<u8>,
    declared_content_type: Option<&str>,
) -> Result<String, ApiError> {
    let (extension, content_type) = match infer::get(&data) {
        Some(info)
            if matches!(
                info.mime_type(),
                "image/jpeg" | "image/png" | "image/gif" | "image/webp"
            ) =>
        {
            (info.extension(), info.mime_type().to_string())
        }
        _ => {
            warn!(
                declared = ?declared_content_type,
                "Rejected profile image upload with unsupported content"
            );
            return Err(ApiError::ValidationError(
                "profile_picture must be a jpeg, png, gif or webp image".to_string(),
            ));
        }
    };

    let filename = format!("profile_{}.{}", generate_raw_id(10), extension);

    if state.aws_service.is_configured() {
        let key = format!("profiles/{}", filename);
        match state
            .aws_service
            .upload_file(data.clone(), &key, &content_type)
            .await
        {
            Ok(url) => return Ok(url),
            Err(e) => {
                warn!(error = %e, "S3 upload failed, falling back to local storage");
            }
        }
    }

    let path = state.uploads_dir.join(&filename);
    tokio::fs::write(&path, &data).await.map_err(|e| {
        error!(error = %e, path = %path.display(), "Failed to save profile image");
        ApiError::InternalServer("Failed to save profile image".to_string())
    })?;

    Ok(format!("/uploads/{}", filename))
}

/// Build the HttpOnly session cookie for the issued token
fn session_cookie(state: &AppState, token: &str) -> Result<HeaderValue, ApiError> {
    let max_age = state.config.token_ttl_minutes * 60;
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    );
    if state.config.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::InternalServer(format!("invalid cookie value: {}", e)))
}

fn clear_session_cookie(state: &AppState) -> Result<HeaderValue, ApiError> {
    let mut cookie =
        format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if state.config.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::InternalServer(format!("invalid cookie value: {}", e)))
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart field: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::validate_email;

    #[test]
    fn test_validate_email_accepts_common_shapes() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("a.b+c@sub.example.co").is_ok());
        assert!(validate_email("émail@example.com").is_ok());
    }

    #[test]
    fn test_validate_email_rejects_malformed_addresses() {
        for bad in [
            "",
            "no-at-sign",
            "@example.com",
            "user@",
            "user@nodot",
            "user@@example.com",
            "a@b@c.com",
            "user@.example.com",
            "user@example.com.",
            "user name@example.com",
        ] {
            assert!(validate_email(bad).is_err(), "accepted {:?}", bad);
        }
    }
}
