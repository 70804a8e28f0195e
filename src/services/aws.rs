// src/services/aws.rs
//! S3 object storage and SES email delivery. Configuration is injected
//! at startup; when AWS is unconfigured the callers degrade (local-disk
//! image storage, logged-and-skipped email).

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_sesv2::Client as SesClient;
use bytes::Bytes;
use thiserror::Error;
use tracing::{error, info};

use crate::common::config::AwsSettings;

#[derive(Debug, Error)]
pub enum AwsError {
    #[error("AWS credentials not configured")]
    NotConfigured,

    #[error("S3 operation failed: {0}")]
    S3Error(String),

    #[error("SES operation failed: {0}")]
    SesError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug)]
pub struct AwsService {
    settings: Option<AwsSettings>,
}

impl AwsService {
    pub fn new(settings: Option<AwsSettings>) -> Self {
        Self { settings }
    }

    pub fn is_configured(&self) -> bool {
        self.settings.is_some()
    }

    fn settings(&self) -> Result<&AwsSettings, AwsError> {
        self.settings.as_ref().ok_or(AwsError::NotConfigured)
    }

    async fn get_s3_client(&self) -> Result<(S3Client, String), AwsError> {
        let settings = self.settings()?;

        if settings.s3_bucket_name.is_empty() {
            return Err(AwsError::InvalidConfig(
                "S3 bucket name not configured".to_string(),
            ));
        }

        let credentials = Credentials::new(
            &settings.access_key_id,
            &settings.secret_access_key,
            None,
            None,
            "config",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        Ok((S3Client::new(&aws_config), settings.s3_bucket_name.clone()))
    }

    /// Upload a file to S3 and return its public URL
    pub async fn upload_file(
        &self,
        file_data: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<String, AwsError> {
        let (client, bucket) = self.get_s3_client().await?;

        let body = ByteStream::from(Bytes::from(file_data));

        client
            .put_object()
            .bucket(&bucket)
            .key(file_name)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, key = %file_name, "Failed to upload file to S3");
                AwsError::S3Error(format!("Upload failed: {}", e))
            })?;

        let url = self.get_file_url(file_name)?;

        info!(key = %file_name, bucket = %bucket, "File uploaded to S3");
        Ok(url)
    }

    /// Delete a single file from S3
    pub async fn delete_file(&self, key: &str) -> Result<(), AwsError> {
        let (client, bucket) = self.get_s3_client().await?;

        client
            .delete_object()
            .bucket(&bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, key = %key, "Failed to delete S3 object");
                AwsError::S3Error(format!("Delete failed: {}", e))
            })?;

        info!(key = %key, "File deleted from S3");
        Ok(())
    }

    /// Standard S3 object URL
    pub fn get_file_url(&self, key: &str) -> Result<String, AwsError> {
        let settings = self.settings()?;
        Ok(format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            settings.s3_bucket_name, settings.region, key
        ))
    }

    /// Recover the object key from a URL produced by [`get_file_url`].
    /// Returns `None` for URLs outside the configured bucket (local
    /// `/uploads/` refs, provider avatar URLs).
    pub fn key_from_url(&self, url: &str) -> Option<String> {
        let settings = self.settings.as_ref()?;
        let prefix = format!(
            "https://{}.s3.{}.amazonaws.com/",
            settings.s3_bucket_name, settings.region
        );
        url.strip_prefix(&prefix)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }

    async fn get_ses_client(&self) -> Result<(SesClient, String), AwsError> {
        let settings = self.settings()?;

        if settings.ses_from_email.is_empty() {
            return Err(AwsError::InvalidConfig(
                "SES from email not configured".to_string(),
            ));
        }

        let credentials = Credentials::new(
            &settings.access_key_id,
            &settings.secret_access_key,
            None,
            None,
            "config",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.ses_region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        Ok((SesClient::new(&aws_config), settings.ses_from_email.clone()))
    }

    /// Send an HTML email via SES
    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), AwsError> {
        let (client, from_email) = self.get_ses_client().await?;

        use aws_sdk_sesv2::types::{Body as SesBody, Content, Destination, EmailContent, Message};

        let destination = Destination::builder().to_addresses(to).build();

        let subject_content = Content::builder()
            .data(subject)
            .charset("UTF-8")
            .build()
            .map_err(|e| AwsError::SesError(format!("Failed to build subject: {}", e)))?;

        let body_content = Content::builder()
            .data(html_body)
            .charset("UTF-8")
            .build()
            .map_err(|e| AwsError::SesError(format!("Failed to build body: {}", e)))?;

        let ses_body = SesBody::builder().html(body_content).build();

        let message = Message::builder()
            .subject(subject_content)
            .body(ses_body)
            .build();

        let email_content = EmailContent::builder().simple(message).build();

        let result = client
            .send_email()
            .from_email_address(&from_email)
            .destination(destination)
            .content(email_content)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send email via SES");
                AwsError::SesError(format!("Send failed: {}", e))
            })?;

        info!(message_id = ?result.message_id(), "Email sent via SES");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured_service() -> AwsService {
        AwsService::new(Some(AwsSettings {
            access_key_id: "test_key".to_string(),
            secret_access_key: "test_secret".to_string(),
            region: "us-east-1".to_string(),
            s3_bucket_name: "my-bucket".to_string(),
            ses_from_email: "noreply@example.com".to_string(),
            ses_region: "us-east-1".to_string(),
        }))
    }

    #[test]
    fn test_unconfigured_service_errors() {
        let service = AwsService::new(None);
        assert!(!service.is_configured());
        assert!(matches!(
            service.get_file_url("x"),
            Err(AwsError::NotConfigured)
        ));
    }

    #[test]
    fn test_get_file_url_standard() {
        let service = configured_service();
        assert_eq!(
            service.get_file_url("profiles/pic.png").unwrap(),
            "https://my-bucket.s3.us-east-1.amazonaws.com/profiles/pic.png"
        );
    }

    #[test]
    fn test_key_from_url_round_trips_own_urls() {
        let service = configured_service();
        let url = service.get_file_url("profiles/pic.png").unwrap();
        assert_eq!(service.key_from_url(&url).as_deref(), Some("profiles/pic.png"));
    }

    #[test]
    fn test_key_from_url_ignores_foreign_refs() {
        let service = configured_service();
        assert!(service.key_from_url("/uploads/profile_abc.png").is_none());
        assert!(service
            .key_from_url("https://lh3.googleusercontent.com/a/avatar")
            .is_none());
        assert!(AwsService::new(None)
            .key_from_url("https://my-bucket.s3.us-east-1.amazonaws.com/x")
            .is_none());
    }
}
