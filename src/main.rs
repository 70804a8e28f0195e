// src/main.rs
use axum::{extract::Extension, routing::get, Json, Router};
use dotenv::dotenv;
use reqwest::Client;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::PathBuf;
use std::time::Duration;
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod auth;
mod common;
mod services;
mod users;

use common::{AppConfig, AppState};
use services::{AwsService, GoogleService};

/// Bounded timeout for all outbound calls (OAuth exchange, tokeninfo)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ========================================================================
    // CONFIGURATION
    // ========================================================================

    let config = AppConfig::from_env();

    tokio::fs::create_dir_all(&config.uploads_dir).await?;

    // ========================================================================
    // DATABASE SETUP
    // ========================================================================

    if let Some(path_part) = config.database_url.strip_prefix("sqlite://") {
        let path_without_params = path_part.split('?').next().unwrap_or("");
        if !path_without_params.is_empty() && !path_without_params.starts_with(':') {
            let db_path = PathBuf::from(path_without_params);
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
    }

    let connect_options =
        SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(connect_options)
        .await?;

    common::migrations::run_migrations(&pool).await?;

    // ========================================================================
    // SERVICE INITIALIZATION
    // ========================================================================

    let http_client = Client::builder().timeout(HTTP_TIMEOUT).build()?;

    let aws_service = Arc::new(AwsService::new(config.aws.clone()));
    info!(configured = aws_service.is_configured(), "AwsService initialized");

    let google_service = Arc::new(GoogleService::new(
        config.google.clone(),
        http_client.clone(),
    ));
    info!(configured = config.google.is_some(), "GoogleService initialized");

    // ========================================================================
    // APPLICATION STATE
    // ========================================================================

    let app_state = Arc::new(AppState {
        db: pool.clone(),
        http: http_client,
        uploads_dir: PathBuf::from(&config.uploads_dir),
        config: config.clone(),
        aws_service,
        google_service,
    });

    // ========================================================================
    // ROUTER COMPOSITION
    // ========================================================================

    let app = Router::new()
        .route("/", get(root))
        .merge(auth::auth_routes())
        .merge(users::users_routes())
        .layer(Extension(app_state))
        .layer({
            let origins: Vec<axum::http::HeaderValue> = config
                .cors_origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::PATCH,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::AUTHORIZATION,
                ])
                .allow_credentials(true)
        })
        .layer(TraceLayer::new_for_http());

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    pool.close().await;

    Ok(())
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Project is running" }))
}
