// src/services/google.rs
//! Google OAuth exchanger: trades an authorization code for an identity
//! assertion (email, name, picture) via the token and tokeninfo
//! endpoints. Single attempt per callback, bounded timeout, no retry.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::common::config::GoogleOAuthConfig;
use crate::common::{safe_email_log, ApiError};

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const TOKENINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v3/tokeninfo";

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("Google OAuth not configured")]
    NotConfigured,

    #[error("Missing ID token in provider response")]
    MissingIdToken,

    #[error("OAuth exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Identity assertion invalid: {0}")]
    InvalidAssertion(String),
}

impl From<GoogleError> for ApiError {
    fn from(e: GoogleError) -> Self {
        match e {
            GoogleError::MissingIdToken => ApiError::BadRequest("Missing ID token".to_string()),
            GoogleError::NotConfigured => {
                ApiError::Upstream("Google OAuth not configured".to_string())
            }
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

/// Profile claims extracted from a verified Google ID token
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleIdentity {
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub email_verified: bool,
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    id_token: Option<String>,
}

// tokeninfo v3 serves email_verified as the string "true"/"false"
#[derive(Debug, Deserialize)]
struct TokenInfoPayload {
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
    email_verified: Option<serde_json::Value>,
}

impl TokenInfoPayload {
    fn email_verified(&self) -> bool {
        match &self.email_verified {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s == "true",
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GoogleService {
    config: Option<GoogleOAuthConfig>,
    client: Client,
}

impl GoogleService {
    pub fn new(config: Option<GoogleOAuthConfig>, client: Client) -> Self {
        Self { config, client }
    }

    fn config(&self) -> Result<&GoogleOAuthConfig, GoogleError> {
        self.config.as_ref().ok_or(GoogleError::NotConfigured)
    }

    /// Build the provider consent-screen URL for the login redirect
    pub fn authorize_url(&self) -> Result<String, GoogleError> {
        let config = self.config()?;
        let scope = "openid email profile";

        let url = format!(
            "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope={}",
            urlencoding::encode(&config.client_id),
            urlencoding::encode(&config.redirect_uri),
            urlencoding::encode(scope)
        );

        debug!("Generated Google OAuth authorization URL");
        Ok(url)
    }

    /// Exchange an authorization code for an ID token
    pub async fn exchange_code(&self, code: &str) -> Result<String, GoogleError> {
        let config = self.config()?;

        let params = [
            ("code", code),
            ("client_id", &config.client_id),
            ("client_secret", &config.client_secret),
            ("redirect_uri", &config.redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        debug!("Exchanging authorization code for tokens");

        let response = self
            .client
            .post(TOKEN_ENDPOINT)
            .form(&params)
            .send()
            .await
            .map_err(|e| GoogleError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Token exchange failed");
            return Err(GoogleError::ExchangeFailed(format!("HTTP {}", status)));
        }

        let token_response = response
            .json::<TokenExchangeResponse>()
            .await
            .map_err(|e| GoogleError::ExchangeFailed(e.to_string()))?;

        extract_id_token(token_response)
    }

    /// Introspect an ID token for profile claims
    pub async fn fetch_identity(&self, id_token: &str) -> Result<GoogleIdentity, GoogleError> {
        let response = self
            .client
            .get(TOKENINFO_ENDPOINT)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| GoogleError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            error!(status = %status, "tokeninfo introspection failed");
            return Err(GoogleError::ExchangeFailed(format!("HTTP {}", status)));
        }

        let payload = response
            .json::<TokenInfoPayload>()
            .await
            .map_err(|e| GoogleError::ExchangeFailed(e.to_string()))?;

        let identity = build_identity(payload)?;
        info!(
            email = %safe_email_log(&identity.email),
            email_verified = identity.email_verified,
            "Fetched Google identity assertion"
        );
        Ok(identity)
    }

    /// Full exchange: authorization code -> identity assertion
    pub async fn exchange_code_for_identity(
        &self,
        code: &str,
    ) -> Result<GoogleIdentity, GoogleError> {
        let id_token = self.exchange_code(code).await?;
        self.fetch_identity(&id_token).await
    }
}

fn extract_id_token(response: TokenExchangeResponse) -> Result<String, GoogleError> {
    response.id_token.ok_or(GoogleError::MissingIdToken)
}

fn build_identity(payload: TokenInfoPayload) -> Result<GoogleIdentity, GoogleError> {
    let email_verified = payload.email_verified();
    let email = payload
        .email
        .ok_or_else(|| GoogleError::InvalidAssertion("assertion missing email".to_string()))?;

    Ok(GoogleIdentity {
        email,
        name: payload.name,
        picture: payload.picture,
        email_verified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_id_token_is_rejected() {
        let response = TokenExchangeResponse { id_token: None };
        assert!(matches!(
            extract_id_token(response),
            Err(GoogleError::MissingIdToken)
        ));
    }

    #[test]
    fn test_id_token_is_extracted() {
        let response = TokenExchangeResponse {
            id_token: Some("abc".to_string()),
        };
        assert_eq!(extract_id_token(response).unwrap(), "abc");
    }

    #[test]
    fn test_email_verified_parses_string_and_bool() {
        let payload: TokenInfoPayload =
            serde_json::from_str(r#"{"email":"a@b.com","email_verified":"true"}"#).unwrap();
        assert!(payload.email_verified());

        let payload: TokenInfoPayload =
            serde_json::from_str(r#"{"email":"a@b.com","email_verified":false}"#).unwrap();
        assert!(!payload.email_verified());

        let payload: TokenInfoPayload = serde_json::from_str(r#"{"email":"a@b.com"}"#).unwrap();
        assert!(!payload.email_verified());
    }

    #[test]
    fn test_assertion_without_email_is_invalid() {
        let payload: TokenInfoPayload = serde_json::from_str(r#"{"name":"A"}"#).unwrap();
        assert!(matches!(
            build_identity(payload),
            Err(GoogleError::InvalidAssertion(_))
        ));
    }

    #[test]
    fn test_authorize_url_requires_config() {
        let service = GoogleService::new(None, Client::new());
        assert!(matches!(
            service.authorize_url(),
            Err(GoogleError::NotConfigured)
        ));
    }

    #[test]
    fn test_authorize_url_encodes_parameters() {
        let service = GoogleService::new(
            Some(crate::common::config::GoogleOAuthConfig {
                client_id: "client id".to_string(),
                client_secret: "secret".to_string(),
                redirect_uri: "http://localhost:8080/auth/google/callback".to_string(),
            }),
            Client::new(),
        );
        let url = service.authorize_url().unwrap();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains("scope=openid%20email%20profile"));
    }
}
