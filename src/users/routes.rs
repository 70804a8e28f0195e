//! User profile routes

use axum::{
    routing::{delete, get, patch},
    Router,
};

use super::handlers;

/// Creates and returns the user profile router
///
/// # Routes
/// - `GET /user/info` - Current user's profile
/// - `PATCH /user/update` - Update name and/or profile picture
/// - `DELETE /user/delete` - Delete the account
pub fn users_routes() -> Router {
    Router::new()
        .route("/user/info", get(handlers::get_user_info))
        .route("/user/update", patch(handlers::update_user_info))
        .route("/user/delete", delete(handlers::delete_user_account))
}
