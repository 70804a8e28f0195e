//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts, HeaderMap,
    },
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::models::User;
use super::token::verify_token;
use crate::common::{safe_email_log, ApiError, AppState};

/// Name of the session cookie set on login
pub const SESSION_COOKIE_NAME: &str = "access_token";

/// Pull the session token from the `access_token` cookie, falling back to
/// a Bearer authorization header.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(COOKIE).and_then(|h| h.to_str().ok()) {
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            if key.trim() == SESSION_COOKIE_NAME && !val.trim().is_empty() {
                return Some(val.trim().to_string());
            }
        }
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.trim().strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Authenticated user extractor
///
/// Validates the session token and loads the user record. Any failure -
/// missing token, bad signature, expiry, unknown user - is a uniform 401.
#[derive(Debug)]
pub struct AuthedUser {
    pub user: User,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(app_state): Extension<Arc<AppState>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        let token = extract_session_token(&parts.headers).ok_or_else(|| {
            warn!("Authentication failed: no session token presented");
            ApiError::Unauthorized("not authenticated".to_string())
        })?;

        let claims = verify_token(&token, &app_state.config.jwt_secret)?;

        let user = super::repository::find_user_by_id(&app_state.db, &claims.user_id)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.user_id, "Authentication failed: user not found");
                ApiError::Unauthorized("user not found".to_string())
            })?;

        debug!(
            user_id = %user.id,
            email = %safe_email_log(&user.email),
            "User authenticated via session token"
        );

        Ok(AuthedUser { user })
    }
}
