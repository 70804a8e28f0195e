// Application state shared across all modules

use reqwest::Client;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

use crate::common::config::AppConfig;
use crate::services::{AwsService, GoogleService};

/// Application state containing the database pool, outbound HTTP client,
/// configuration and shared services. Built once in `main` and injected
/// as an axum `Extension`.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub http: Client,
    pub uploads_dir: PathBuf,
    pub config: AppConfig,
    pub aws_service: Arc<AwsService>,
    pub google_service: Arc<GoogleService>,
}
