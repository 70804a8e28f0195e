// src/common/config.rs
//! Typed application configuration, read once at startup and injected
//! through `AppState`. No component reads environment variables at
//! request time.

use std::env;

/// Google OAuth client configuration. Optional: when unset, the
/// federated-login endpoints answer with an upstream error.
#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// AWS configuration shared by the S3 and SES clients. Optional: when
/// unset, profile images fall back to local disk and OTP email delivery
/// fails softly.
#[derive(Debug, Clone)]
pub struct AwsSettings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub s3_bucket_name: String,
    pub ses_from_email: String,
    pub ses_region: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub uploads_dir: String,
    pub jwt_secret: String,
    /// Session token lifetime in minutes
    pub token_ttl_minutes: i64,
    /// bcrypt cost factor
    pub bcrypt_cost: u32,
    /// Append `Secure` to session cookies (TLS deployments)
    pub cookie_secure: bool,
    pub google: Option<GoogleOAuthConfig>,
    pub aws: Option<AwsSettings>,
    pub cors_origins: String,
    pub port: u16,
}

impl AppConfig {
    /// Load configuration from the process environment. Missing optional
    /// sections (Google, AWS) are tolerated; the owning services degrade
    /// gracefully.
    pub fn from_env() -> Self {
        let google = match (
            env::var("GOOGLE_CLIENT_ID"),
            env::var("GOOGLE_CLIENT_SECRET"),
        ) {
            (Ok(client_id), Ok(client_secret)) => Some(GoogleOAuthConfig {
                client_id,
                client_secret,
                redirect_uri: env::var("GOOGLE_REDIRECT_URI").unwrap_or_else(|_| {
                    "http://localhost:8080/auth/google/callback".to_string()
                }),
            }),
            _ => None,
        };

        let aws = match (
            env::var("AWS_ACCESS_KEY_ID"),
            env::var("AWS_SECRET_ACCESS_KEY"),
        ) {
            (Ok(access_key_id), Ok(secret_access_key)) => {
                let region = env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());
                Some(AwsSettings {
                    access_key_id,
                    secret_access_key,
                    ses_region: env::var("AWS_SES_REGION").unwrap_or_else(|_| region.clone()),
                    region,
                    s3_bucket_name: env::var("AWS_S3_BUCKET_NAME").unwrap_or_default(),
                    ses_from_email: env::var("AWS_SES_FROM_EMAIL").unwrap_or_default(),
                })
            }
            _ => None,
        };

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://shop_api.db".to_string()),
            uploads_dir: env::var("UPLOADS_DIR").unwrap_or_else(|_| "./uploads".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "replace_with_strong_secret".to_string()),
            token_ttl_minutes: env::var("TOKEN_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            bcrypt_cost: env::var("BCRYPT_COST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(12),
            cookie_secure: env::var("COOKIE_SECURE")
                .map(|v| v == "true")
                .unwrap_or(false),
            google,
            aws,
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
        }
    }
}
