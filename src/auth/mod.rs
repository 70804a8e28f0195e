//! Authentication and identity reconciliation
//!
//! Local registration with email-OTP verification, password login with
//! stateless JWT session cookies, and Google OAuth login reconciled
//! against the local user store by email.

pub mod extractors;
pub mod handlers;
pub mod models;
pub mod otp;
pub mod password;
pub mod repository;
pub mod routes;
pub mod token;

#[cfg(test)]
mod tests;

pub use routes::auth_routes;
