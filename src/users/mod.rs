//! Authenticated user profile endpoints

pub mod handlers;
pub mod routes;

pub use routes::users_routes;
