//! Tests for the auth module
//!
//! Covers the credential store, OTP lifecycle and identity
//! reconciliation against an in-memory SQLite database.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::Extension;
use axum::http::{header, Request, StatusCode};
use chrono::{Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tower::ServiceExt;

use super::password::hash_password;
use super::repository::{self, ReconcileOutcome};
use super::routes::auth_routes;
use crate::common::migrations::run_migrations;
use crate::common::{AppConfig, AppState};
use crate::services::google::GoogleIdentity;
use crate::services::{AwsService, GoogleService};

// Low bcrypt cost keeps the suite fast
const TEST_COST: u32 = 4;

async fn setup_test_db() -> SqlitePool {
    // One connection: each :memory: connection is its own database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

async fn insert_otp_with_expiry(pool: &SqlitePool, email: &str, otp: &str, expires_in_secs: i64) {
    let now = Utc::now();
    sqlx::query("INSERT INTO otps (email, otp, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(email)
        .bind(otp)
        .bind(now.to_rfc3339())
        .bind((now + Duration::seconds(expires_in_secs)).to_rfc3339())
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_and_find_user() {
    let pool = setup_test_db().await;

    let user = repository::create_user(&pool, "Alice", "alice@example.com", "digest", None)
        .await
        .unwrap();
    assert!(user.id.starts_with("U_"));
    assert!(!user.is_verified);
    assert_eq!(user.auth_provider, "manual");

    let found = repository::find_user_by_email(&pool, "alice@example.com")
        .await
        .unwrap();
    assert_eq!(found.unwrap().id, user.id);

    let missing = repository::find_user_by_email(&pool, "nobody@example.com")
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_duplicate_email_rejected_by_store() {
    let pool = setup_test_db().await;

    repository::create_user(&pool, "Alice", "alice@example.com", "digest", None)
        .await
        .unwrap();

    // The unique constraint is the last line of defense behind the
    // handler's explicit existence check
    let result = repository::create_user(&pool, "Imposter", "alice@example.com", "other", None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_mark_verified_and_update_password() {
    let pool = setup_test_db().await;

    let user = repository::create_user(&pool, "Alice", "alice@example.com", "digest", None)
        .await
        .unwrap();
    repository::mark_user_verified(&pool, &user).await.unwrap();

    let user = repository::find_user_by_id(&pool, &user.id)
        .await
        .unwrap()
        .unwrap();
    assert!(user.is_verified);

    repository::update_user_password(&pool, "alice@example.com", "new-digest")
        .await
        .unwrap();
    let user = repository::find_user_by_email(&pool, "alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.password_hash, "new-digest");
}

#[tokio::test]
async fn test_otp_consume_matches_code_and_window() {
    let pool = setup_test_db().await;

    repository::store_otp(&pool, "alice@example.com", "123456")
        .await
        .unwrap();

    // Matching code inside the window
    let record = repository::consume_otp(&pool, "alice@example.com", "123456")
        .await
        .unwrap();
    assert!(record.is_some());

    // Wrong code
    let record = repository::consume_otp(&pool, "alice@example.com", "000000")
        .await
        .unwrap();
    assert!(record.is_none());

    // Wrong email
    let record = repository::consume_otp(&pool, "bob@example.com", "123456")
        .await
        .unwrap();
    assert!(record.is_none());
}

#[tokio::test]
async fn test_otp_expiry_boundary() {
    let pool = setup_test_db().await;

    // Just inside the window
    insert_otp_with_expiry(&pool, "near@example.com", "111111", 1).await;
    let record = repository::consume_otp(&pool, "near@example.com", "111111")
        .await
        .unwrap();
    assert!(record.is_some());

    // Just past the window
    insert_otp_with_expiry(&pool, "late@example.com", "222222", -1).await;
    let record = repository::consume_otp(&pool, "late@example.com", "222222")
        .await
        .unwrap();
    assert!(record.is_none());
}

#[tokio::test]
async fn test_update_otp_overwrites_newest_record() {
    let pool = setup_test_db().await;

    repository::store_otp(&pool, "alice@example.com", "111111")
        .await
        .unwrap();
    repository::update_otp(&pool, "alice@example.com", "222222")
        .await
        .unwrap();

    let old = repository::consume_otp(&pool, "alice@example.com", "111111")
        .await
        .unwrap();
    assert!(old.is_none());

    let new = repository::consume_otp(&pool, "alice@example.com", "222222")
        .await
        .unwrap();
    assert!(new.is_some());
}

#[tokio::test]
async fn test_update_otp_without_prior_record_inserts() {
    let pool = setup_test_db().await;

    repository::update_otp(&pool, "fresh@example.com", "333333")
        .await
        .unwrap();
    let record = repository::consume_otp(&pool, "fresh@example.com", "333333")
        .await
        .unwrap();
    assert!(record.is_some());
}

#[tokio::test]
async fn test_consumed_otp_cannot_be_replayed_after_delete() {
    let pool = setup_test_db().await;

    repository::store_otp(&pool, "alice@example.com", "123456")
        .await
        .unwrap();
    assert!(repository::consume_otp(&pool, "alice@example.com", "123456")
        .await
        .unwrap()
        .is_some());

    repository::delete_otps_for_email(&pool, "alice@example.com")
        .await
        .unwrap();

    assert!(repository::consume_otp(&pool, "alice@example.com", "123456")
        .await
        .unwrap()
        .is_none());
}

fn identity(email: &str, name: &str, picture: &str) -> GoogleIdentity {
    GoogleIdentity {
        email: email.to_string(),
        name: Some(name.to_string()),
        picture: Some(picture.to_string()),
        email_verified: true,
    }
}

#[tokio::test]
async fn test_reconcile_creates_verified_google_user() {
    let pool = setup_test_db().await;

    let assertion = identity("alice@example.com", "Alice", "https://pics/alice.png");
    let (user, outcome) = repository::get_or_create_google_user(&pool, &assertion, TEST_COST)
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Created);
    assert!(user.is_verified);
    assert_eq!(user.auth_provider, "google");
    assert_eq!(user.profile_picture.as_deref(), Some("https://pics/alice.png"));
    // Federated accounts get an unguessable placeholder, never an empty hash
    assert!(!user.password_hash.is_empty());
}

#[tokio::test]
async fn test_reconcile_unchanged_assertion_performs_no_write() {
    let pool = setup_test_db().await;

    let assertion = identity("alice@example.com", "Alice", "https://pics/alice.png");
    repository::get_or_create_google_user(&pool, &assertion, TEST_COST)
        .await
        .unwrap();

    let (_, outcome) = repository::get_or_create_google_user(&pool, &assertion, TEST_COST)
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Unchanged);
}

#[tokio::test]
async fn test_reconcile_syncs_changed_profile_fields() {
    let pool = setup_test_db().await;

    let assertion = identity("alice@example.com", "Alice", "https://pics/alice.png");
    repository::get_or_create_google_user(&pool, &assertion, TEST_COST)
        .await
        .unwrap();

    let renamed = identity("alice@example.com", "Alice Smith", "https://pics/alice.png");
    let (user, outcome) = repository::get_or_create_google_user(&pool, &renamed, TEST_COST)
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Updated);
    assert_eq!(user.name, "Alice Smith");
}

#[tokio::test]
async fn test_reconcile_links_existing_manual_account() {
    let pool = setup_test_db().await;

    repository::create_user(&pool, "Alice", "alice@example.com", "digest", None)
        .await
        .unwrap();

    let assertion = identity("alice@example.com", "Alice", "https://pics/alice.png");
    let (user, outcome) = repository::get_or_create_google_user(&pool, &assertion, TEST_COST)
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Updated);
    assert!(user.is_verified);
    assert_eq!(user.auth_provider, "google");
    // Local password hash is left untouched by the link
    assert_eq!(user.password_hash, "digest");
}

#[tokio::test]
async fn test_delete_user_removes_record() {
    let pool = setup_test_db().await;

    let user = repository::create_user(&pool, "Alice", "alice@example.com", "digest", None)
        .await
        .unwrap();
    repository::delete_user(&pool, &user.id).await.unwrap();

    let found = repository::find_user_by_id(&pool, &user.id).await.unwrap();
    assert!(found.is_none());
}

// ---- Handler-level tests against the auth router ----

const TEST_SECRET: &str = "test-secret";

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        uploads_dir: "/tmp".to_string(),
        jwt_secret: TEST_SECRET.to_string(),
        token_ttl_minutes: 30,
        bcrypt_cost: TEST_COST,
        cookie_secure: false,
        google: None,
        aws: None,
        cors_origins: "http://localhost:3000".to_string(),
        port: 0,
    }
}

async fn test_app() -> (axum::Router, SqlitePool) {
    let pool = setup_test_db().await;
    let client = reqwest::Client::new();
    let state = Arc::new(AppState {
        db: pool.clone(),
        http: client.clone(),
        uploads_dir: PathBuf::from("/tmp"),
        config: test_config(),
        aws_service: Arc::new(AwsService::new(None)),
        google_service: Arc::new(GoogleService::new(None, client)),
    });
    (auth_routes().layer(Extension(state)), pool)
}

fn json_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_register(name: &str, email: &str, password: &str) -> Request<Body> {
    let boundary = "test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{name}\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"email\"\r\n\r\n{email}\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"password\"\r\n\r\n{password}\r\n\
         --{b}--\r\n",
        b = boundary
    );
    Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_register_creates_unverified_account_and_otp() {
    let (app, pool) = test_app().await;

    let response = app
        .oneshot(multipart_register("Alice", "alice@example.com", "Password@123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let user = repository::find_user_by_email(&pool, "alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(!user.is_verified);

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM otps WHERE email = ?")
        .bind("alice@example.com")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_register_duplicate_email_is_rejected() {
    let (app, pool) = test_app().await;
    repository::create_user(&pool, "Alice", "alice@example.com", "digest", None)
        .await
        .unwrap();

    let response = app
        .oneshot(multipart_register("Imposter", "alice@example.com", "Password@123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_malformed_email_is_rejected() {
    let (app, pool) = test_app().await;

    let response = app
        .oneshot(multipart_register("Alice", "not-an-email", "Password@123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let user = repository::find_user_by_email(&pool, "not-an-email")
        .await
        .unwrap();
    assert!(user.is_none());
}

#[tokio::test]
async fn test_login_before_verification_is_forbidden() {
    let (app, pool) = test_app().await;
    let hash = hash_password("Password@123", TEST_COST).unwrap();
    repository::create_user(&pool, "Alice", "alice@example.com", &hash, None)
        .await
        .unwrap();

    let response = app
        .oneshot(json_post(
            "/auth/login",
            r#"{"email":"alice@example.com","password":"Password@123"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_login_wrong_password_is_rejected() {
    let (app, pool) = test_app().await;
    let hash = hash_password("Password@123", TEST_COST).unwrap();
    let user = repository::create_user(&pool, "Alice", "alice@example.com", &hash, None)
        .await
        .unwrap();
    repository::mark_user_verified(&pool, &user).await.unwrap();

    let response = app
        .oneshot(json_post(
            "/auth/login",
            r#"{"email":"alice@example.com","password":"Wrong@12345"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_sets_cookie_and_blocks_second_login() {
    let (app, pool) = test_app().await;
    let hash = hash_password("Password@123", TEST_COST).unwrap();
    let user = repository::create_user(&pool, "Alice", "alice@example.com", &hash, None)
        .await
        .unwrap();
    repository::mark_user_verified(&pool, &user).await.unwrap();

    let body = r#"{"email":"alice@example.com","password":"Password@123"}"#;

    let response = app
        .clone()
        .oneshot(json_post("/auth/login", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("access_token="));
    assert!(cookie.contains("HttpOnly"));

    // A live session cookie blocks a second login
    let session = cookie.split(';').next().unwrap().to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, session)
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_user_profile_partial_fields() {
    let pool = setup_test_db().await;

    let user = repository::create_user(&pool, "Alice", "alice@example.com", "digest", None)
        .await
        .unwrap();

    let updated = repository::update_user_profile(&pool, &user.id, Some("Alice Smith"), None)
        .await
        .unwrap();
    assert_eq!(updated.name, "Alice Smith");
    assert!(updated.profile_picture.is_none());

    let updated =
        repository::update_user_profile(&pool, &user.id, None, Some("/uploads/p.png"))
            .await
            .unwrap();
    assert_eq!(updated.name, "Alice Smith");
    assert_eq!(updated.profile_picture.as_deref(), Some("/uploads/p.png"));
}
