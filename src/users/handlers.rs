//! User profile handlers. All routes require an authenticated session.

use axum::extract::{Extension, Json, Multipart};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::extractors::AuthedUser;
use crate::auth::handlers::store_profile_image;
use crate::auth::repository;
use crate::common::{ApiError, AppState};

/// GET /user/info
pub async fn get_user_info(authed: AuthedUser) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(serde_json::json!({ "user": authed.user })))
}

/// PATCH /user/update
///
/// Multipart body with optional `name` and `profile_picture` fields;
/// only supplied fields are written.
pub async fn update_user_info(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut name: Option<String> = None;
    let mut picture_ref: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        match field.name().unwrap_or_default() {
            "name" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("malformed field: {}", e)))?;
                if !value.trim().is_empty() {
                    name = Some(value);
                }
            }
            "profile_picture" => {
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {}", e)))?;
                if !data.is_empty() {
                    picture_ref = Some(
                        store_profile_image(&state, data.to_vec(), content_type.as_deref())
                            .await?,
                    );
                }
            }
            other => {
                debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    let user = repository::update_user_profile(
        &state.db,
        &authed.user.id,
        name.as_deref(),
        picture_ref.as_deref(),
    )
    .await?;

    // The replaced image is gone from the record; drop the orphaned
    // object. Best effort, the update already committed.
    if picture_ref.is_some() {
        if let Some(key) = authed
            .user
            .profile_picture
            .as_deref()
            .and_then(|old| state.aws_service.key_from_url(old))
        {
            if let Err(e) = state.aws_service.delete_file(&key).await {
                warn!(error = %e, key = %key, "Failed to delete replaced profile image");
            }
        }
    }

    info!(user_id = %user.id, "User profile updated");
    Ok(Json(serde_json::json!({ "user": user })))
}

/// DELETE /user/delete
pub async fn delete_user_account(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    repository::delete_user(&state.db, &authed.user.id).await?;
    Ok(Json(serde_json::json!({ "msg": "User deleted successfully" })))
}
