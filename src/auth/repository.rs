//! Credential store: user and OTP persistence, plus the identity
//! reconciler's storage arm.
//!
//! Each function is a single logical unit of work committing on its own;
//! there is no cross-request locking, so concurrent verifies for the same
//! email race and commit order decides the winner.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use super::models::{OtpRecord, User};
use super::otp::OTP_TTL_MINUTES;
use super::password::hash_password;
use crate::common::{generate_raw_id, generate_user_id, safe_email_log, ApiError};
use crate::services::google::GoogleIdentity;

/// Outcome of reconciling an external identity assertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created,
    Updated,
    /// Profile fields matched the stored record; no write was performed
    Unchanged,
}

pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, ApiError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_user_by_id(pool: &SqlitePool, id: &str) -> Result<Option<User>, ApiError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn create_user(
    pool: &SqlitePool,
    name: &str,
    email: &str,
    password_hash: &str,
    profile_picture: Option<&str>,
) -> Result<User, ApiError> {
    let id = generate_user_id();

    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, password_hash, profile_picture, is_verified, auth_provider)
        VALUES (?, ?, ?, ?, ?, 0, 'manual')
        "#,
    )
    .bind(&id)
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(profile_picture)
    .execute(pool)
    .await?;

    info!(user_id = %id, email = %safe_email_log(email), "User account created");

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await?;
    Ok(user)
}

pub async fn mark_user_verified(pool: &SqlitePool, user: &User) -> Result<(), ApiError> {
    sqlx::query("UPDATE users SET is_verified = 1 WHERE id = ?")
        .bind(&user.id)
        .execute(pool)
        .await?;
    info!(user_id = %user.id, "User email verified");
    Ok(())
}

pub async fn update_user_password(
    pool: &SqlitePool,
    email: &str,
    new_hash: &str,
) -> Result<(), ApiError> {
    sqlx::query("UPDATE users SET password_hash = ? WHERE email = ?")
        .bind(new_hash)
        .bind(email)
        .execute(pool)
        .await?;
    info!(email = %safe_email_log(email), "User password updated");
    Ok(())
}

pub async fn update_user_profile(
    pool: &SqlitePool,
    user_id: &str,
    name: Option<&str>,
    profile_picture: Option<&str>,
) -> Result<User, ApiError> {
    if let Some(name) = name {
        sqlx::query("UPDATE users SET name = ? WHERE id = ?")
            .bind(name)
            .bind(user_id)
            .execute(pool)
            .await?;
    }
    if let Some(picture) = profile_picture {
        sqlx::query("UPDATE users SET profile_picture = ? WHERE id = ?")
            .bind(picture)
            .bind(user_id)
            .execute(pool)
            .await?;
    }

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(user)
}

pub async fn delete_user(pool: &SqlitePool, user_id: &str) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    info!(user_id = %user_id, "User account deleted");
    Ok(())
}

// ---- OTP records ----

/// Insert a fresh OTP record with a new 10-minute expiry window
pub async fn store_otp(pool: &SqlitePool, email: &str, otp: &str) -> Result<(), ApiError> {
    let now = Utc::now();
    let expires_at = now + Duration::minutes(OTP_TTL_MINUTES);

    sqlx::query("INSERT INTO otps (email, otp, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(email)
        .bind(otp)
        .bind(now.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .execute(pool)
        .await?;

    debug!(email = %safe_email_log(email), "OTP stored");
    Ok(())
}

/// Overwrite the newest OTP record's code and expiry for the email.
/// Falls back to a fresh insert when no prior record exists.
pub async fn update_otp(pool: &SqlitePool, email: &str, otp: &str) -> Result<(), ApiError> {
    let expires_at = Utc::now() + Duration::minutes(OTP_TTL_MINUTES);

    let result = sqlx::query(
        r#"
        UPDATE otps SET otp = ?, expires_at = ?
        WHERE id = (SELECT id FROM otps WHERE email = ? ORDER BY id DESC LIMIT 1)
        "#,
    )
    .bind(otp)
    .bind(expires_at.to_rfc3339())
    .bind(email)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        store_otp(pool, email, otp).await?;
    } else {
        debug!(email = %safe_email_log(email), "OTP overwritten");
    }
    Ok(())
}

/// Return the newest matching OTP record, but only while unexpired.
/// Consumption (deletion) is an explicit separate step so callers decide
/// when a code is actually spent.
pub async fn consume_otp(
    pool: &SqlitePool,
    email: &str,
    otp: &str,
) -> Result<Option<OtpRecord>, ApiError> {
    let record = sqlx::query_as::<_, OtpRecord>(
        "SELECT * FROM otps WHERE email = ? AND otp = ? ORDER BY id DESC LIMIT 1",
    )
    .bind(email)
    .bind(otp)
    .fetch_optional(pool)
    .await?;

    let Some(record) = record else {
        return Ok(None);
    };

    let expires_at = DateTime::parse_from_rfc3339(&record.expires_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            ApiError::InternalServer(format!("stored OTP expiry is unparseable: {}", e))
        })?;

    if Utc::now() > expires_at {
        debug!(email = %safe_email_log(email), "OTP matched but expired");
        return Ok(None);
    }

    Ok(Some(record))
}

/// Invalidate all codes for an email after successful use, closing the
/// replay window
pub async fn delete_otps_for_email(pool: &SqlitePool, email: &str) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM otps WHERE email = ?")
        .bind(email)
        .execute(pool)
        .await?;
    Ok(())
}

// ---- Identity reconciliation ----

/// Map a Google identity assertion to a local user record.
///
/// Absent email: create a verified google-provider account with a random
/// placeholder password hash. Present: sync name/picture/verification/
/// provider fields, writing only when something actually changed.
pub async fn get_or_create_google_user(
    pool: &SqlitePool,
    identity: &GoogleIdentity,
    bcrypt_cost: u32,
) -> Result<(User, ReconcileOutcome), ApiError> {
    let existing = find_user_by_email(pool, &identity.email).await?;

    let Some(user) = existing else {
        // Federated accounts have no usable local password
        let placeholder = hash_password(&generate_raw_id(24), bcrypt_cost)?;
        let id = generate_user_id();
        let name = identity.name.clone().unwrap_or_else(|| identity.email.clone());

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, profile_picture, is_verified, auth_provider)
            VALUES (?, ?, ?, ?, ?, 1, 'google')
            "#,
        )
        .bind(&id)
        .bind(&name)
        .bind(&identity.email)
        .bind(&placeholder)
        .bind(identity.picture.as_deref())
        .execute(pool)
        .await?;

        info!(
            user_id = %id,
            email = %safe_email_log(&identity.email),
            "Created user account via Google identity"
        );

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(&id)
            .fetch_one(pool)
            .await?;
        return Ok((user, ReconcileOutcome::Created));
    };

    // Build the minimal set of changed fields to avoid redundant writes
    let mut changed = false;
    let mut name = user.name.clone();
    let mut picture = user.profile_picture.clone();

    if let Some(asserted_name) = &identity.name {
        if *asserted_name != user.name {
            name = asserted_name.clone();
            changed = true;
        }
    }
    if let Some(asserted_picture) = &identity.picture {
        if user.profile_picture.as_deref() != Some(asserted_picture.as_str()) {
            picture = Some(asserted_picture.clone());
            changed = true;
        }
    }
    let needs_verify = !user.is_verified;
    let needs_provider = user.auth_provider != "google";
    if needs_verify || needs_provider {
        changed = true;
    }

    if !changed {
        debug!(user_id = %user.id, "Google identity matches stored record, skipping write");
        return Ok((user, ReconcileOutcome::Unchanged));
    }

    sqlx::query(
        r#"
        UPDATE users SET name = ?, profile_picture = ?, is_verified = 1, auth_provider = 'google'
        WHERE id = ?
        "#,
    )
    .bind(&name)
    .bind(picture.as_deref())
    .bind(&user.id)
    .execute(pool)
    .await?;

    if needs_provider {
        warn!(
            user_id = %user.id,
            prior_provider = %user.auth_provider,
            "Linked existing local account to Google identity"
        );
    }

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&user.id)
        .fetch_one(pool)
        .await?;
    Ok((user, ReconcileOutcome::Updated))
}
