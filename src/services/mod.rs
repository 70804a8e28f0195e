// src/services/mod.rs
//
// Shared services module containing external-collaborator clients
// used across domain modules

pub mod aws;
pub mod email;
pub mod google;

// Re-export commonly used types for convenience
pub use aws::AwsService;
pub use google::GoogleService;
