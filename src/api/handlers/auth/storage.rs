//! Database helpers for account and code state.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::api::email::{TEMPLATE_RESET_CODE, TEMPLATE_VERIFY_OTP};

use super::state::AuthConfig;
use super::types::Role;
use super::utils::is_unique_violation;

/// Outcome when attempting to create a new account.
#[derive(Debug)]
pub(super) enum SignupOutcome {
    Created,
    Conflict,
}

/// Outcome for a verification code resend.
#[derive(Debug)]
pub(super) enum ResendOutcome {
    Queued,
    Cooldown,
    AlreadyVerified,
    NotFound,
}

/// Outcome for a forgot-password request.
#[derive(Debug)]
pub(super) enum ResetRequestOutcome {
    Queued,
    NotFound,
}

/// Everything login needs in one fetch.
pub(super) struct AccountRecord {
    pub(super) id: Uuid,
    pub(super) full_name: String,
    pub(super) email: String,
    pub(super) phone: Option<String>,
    pub(super) address: Option<String>,
    pub(super) password_hash: String,
    pub(super) role: Role,
    pub(super) verified: bool,
}

/// Verification state for the OTP check.
pub(super) struct VerificationRecord {
    pub(super) verified: bool,
    pub(super) code: Option<String>,
    pub(super) expires_at: Option<DateTime<Utc>>,
}

/// Reset state for the password-reset check.
pub(super) struct ResetRecord {
    pub(super) code: Option<String>,
    pub(super) expires_at: Option<DateTime<Utc>>,
}

/// Fields persisted for a new account.
pub(super) struct NewAccount<'a> {
    pub(super) full_name: &'a str,
    pub(super) email: &'a str,
    pub(super) phone: Option<&'a str>,
    pub(super) address: Option<&'a str>,
    pub(super) password_hash: &'a str,
    pub(super) role: Role,
    pub(super) code: &'a str,
}

/// Insert the account row and its pending verification email atomically.
///
/// Uniqueness rests on the email constraint, not a pre-check: a concurrent
/// signup that loses the race surfaces here as a unique violation and maps to
/// [`SignupOutcome::Conflict`].
pub(super) async fn create_account(
    pool: &PgPool,
    account: &NewAccount<'_>,
    config: &AuthConfig,
) -> Result<SignupOutcome> {
    let mut tx = pool.begin().await.context("begin signup transaction")?;

    let query = r"
        INSERT INTO accounts
            (full_name, email, phone, address, password_hash, role,
             verification_code, verification_expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW() + ($8 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(account.full_name)
        .bind(account.email)
        .bind(account.phone)
        .bind(account.address)
        .bind(account.password_hash)
        .bind(account.role)
        .bind(account.code)
        .bind(config.otp_ttl_seconds())
        .execute(&mut *tx)
        .instrument(span)
        .await;

    if let Err(err) = result {
        if is_unique_violation(&err) {
            let _ = tx.rollback().await;
            return Ok(SignupOutcome::Conflict);
        }
        return Err(err).context("failed to insert account");
    }

    enqueue_code_email(
        &mut tx,
        account.email,
        TEMPLATE_VERIFY_OTP,
        account.code,
        config.otp_ttl_seconds(),
    )
    .await?;

    tx.commit().await.context("commit signup transaction")?;

    Ok(SignupOutcome::Created)
}

/// Queue an outbox row carrying a code; delivery happens out of band.
async fn enqueue_code_email(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    email: &str,
    template: &str,
    code: &str,
    ttl_seconds: i64,
) -> Result<()> {
    let payload = json!({
        "email": email,
        "code": code,
        "ttl_minutes": ttl_seconds / 60,
    });
    let payload_text = serde_json::to_string(&payload).context("failed to serialize email payload")?;

    let query = r"
        INSERT INTO email_outbox (to_email, template, payload_json)
        VALUES ($1, $2, $3::jsonb)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind(template)
        .bind(payload_text)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert email outbox row")?;

    Ok(())
}

/// Look up the full account record by normalized email (used by login).
pub(super) async fn find_account_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<AccountRecord>> {
    let query = r"
        SELECT id, full_name, email, phone, address, password_hash, role, verified
        FROM accounts
        WHERE email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account")?;

    Ok(row.map(|row| AccountRecord {
        id: row.get("id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        phone: row.get("phone"),
        address: row.get("address"),
        password_hash: row.get("password_hash"),
        role: row.get("role"),
        verified: row.get("verified"),
    }))
}

/// Fetch the verification state for the OTP three-way check.
pub(super) async fn lookup_verification(
    pool: &PgPool,
    email: &str,
) -> Result<Option<VerificationRecord>> {
    let query = r"
        SELECT verified, verification_code, verification_expires_at
        FROM accounts
        WHERE email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup verification state")?;

    Ok(row.map(|row| VerificationRecord {
        verified: row.get("verified"),
        code: row.get("verification_code"),
        expires_at: row.get("verification_expires_at"),
    }))
}

/// Flip the account to verified and clear the code in one guarded update.
///
/// The code guard makes consumption single-use: a concurrent verify that
/// already cleared the code leaves nothing for this update to match.
pub(super) async fn mark_verified(pool: &PgPool, email: &str, code: &str) -> Result<bool> {
    let query = r"
        UPDATE accounts
        SET verified = TRUE,
            verification_code = NULL,
            verification_expires_at = NULL,
            updated_at = NOW()
        WHERE email = $1
          AND verification_code = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(email)
        .bind(code)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to mark account verified")?;

    Ok(result.rows_affected() > 0)
}

/// Regenerate the verification code and queue a fresh email.
///
/// Within the cooldown window the request is a successful noop so clients can
/// retry freely without flooding the outbox.
pub(super) async fn refresh_verification_code(
    pool: &PgPool,
    email: &str,
    code: &str,
    config: &AuthConfig,
) -> Result<ResendOutcome> {
    let mut tx = pool.begin().await.context("begin resend transaction")?;

    let query = r"
        SELECT verified, verification_expires_at
        FROM accounts
        WHERE email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to lookup account for resend")?;

    let Some(row) = row else {
        tx.commit().await.context("commit resend noop")?;
        return Ok(ResendOutcome::NotFound);
    };

    if row.get::<bool, _>("verified") {
        tx.commit().await.context("commit resend noop")?;
        return Ok(ResendOutcome::AlreadyVerified);
    }

    // The issue time is derived from the stored expiry, so the cooldown needs
    // no extra column.
    let expires_at: Option<DateTime<Utc>> = row.get("verification_expires_at");
    if let Some(expires_at) = expires_at {
        let issued_at = expires_at - Duration::seconds(config.otp_ttl_seconds());
        if Utc::now() < issued_at + Duration::seconds(config.resend_cooldown_seconds()) {
            tx.commit().await.context("commit resend cooldown")?;
            return Ok(ResendOutcome::Cooldown);
        }
    }

    let query = r"
        UPDATE accounts
        SET verification_code = $2,
            verification_expires_at = NOW() + ($3 * INTERVAL '1 second'),
            updated_at = NOW()
        WHERE email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind(code)
        .bind(config.otp_ttl_seconds())
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to refresh verification code")?;

    enqueue_code_email(
        &mut tx,
        email,
        TEMPLATE_VERIFY_OTP,
        code,
        config.otp_ttl_seconds(),
    )
    .await?;

    tx.commit().await.context("commit resend enqueue")?;
    Ok(ResendOutcome::Queued)
}

/// Store a reset code with its expiry and queue the notification email.
pub(super) async fn save_reset_code(
    pool: &PgPool,
    email: &str,
    code: &str,
    config: &AuthConfig,
) -> Result<ResetRequestOutcome> {
    let mut tx = pool.begin().await.context("begin reset transaction")?;

    let query = r"
        UPDATE accounts
        SET reset_code = $2,
            reset_expires_at = NOW() + ($3 * INTERVAL '1 second'),
            updated_at = NOW()
        WHERE email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(email)
        .bind(code)
        .bind(config.reset_ttl_seconds())
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to save reset code")?;

    if result.rows_affected() == 0 {
        tx.commit().await.context("commit reset noop")?;
        return Ok(ResetRequestOutcome::NotFound);
    }

    enqueue_code_email(
        &mut tx,
        email,
        TEMPLATE_RESET_CODE,
        code,
        config.reset_ttl_seconds(),
    )
    .await?;

    tx.commit().await.context("commit reset enqueue")?;
    Ok(ResetRequestOutcome::Queued)
}

/// Fetch the reset state for the password-reset three-way check.
pub(super) async fn lookup_reset(pool: &PgPool, email: &str) -> Result<Option<ResetRecord>> {
    let query = r"
        SELECT reset_code, reset_expires_at
        FROM accounts
        WHERE email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup reset state")?;

    Ok(row.map(|row| ResetRecord {
        code: row.get("reset_code"),
        expires_at: row.get("reset_expires_at"),
    }))
}

/// Write the new password hash and clear the reset code in one guarded update.
pub(super) async fn update_password(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
    code: &str,
) -> Result<bool> {
    let query = r"
        UPDATE accounts
        SET password_hash = $2,
            reset_code = NULL,
            reset_expires_at = NULL,
            updated_at = NOW()
        WHERE email = $1
          AND reset_code = $3
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(email)
        .bind(password_hash)
        .bind(code)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password")?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_outcome_debug_names() {
        assert_eq!(format!("{:?}", SignupOutcome::Created), "Created");
        assert_eq!(format!("{:?}", SignupOutcome::Conflict), "Conflict");
    }

    #[test]
    fn resend_outcome_debug_names() {
        assert_eq!(format!("{:?}", ResendOutcome::Queued), "Queued");
        assert_eq!(format!("{:?}", ResendOutcome::Cooldown), "Cooldown");
        assert_eq!(
            format!("{:?}", ResendOutcome::AlreadyVerified),
            "AlreadyVerified"
        );
        assert_eq!(format!("{:?}", ResendOutcome::NotFound), "NotFound");
    }

    #[test]
    fn account_record_holds_values() {
        let record = AccountRecord {
            id: Uuid::nil(),
            full_name: "A B".to_string(),
            email: "a@b.com".to_string(),
            phone: None,
            address: None,
            password_hash: "hash".to_string(),
            role: Role::Buyer,
            verified: false,
        };
        assert_eq!(record.id, Uuid::nil());
        assert_eq!(record.role, Role::Buyer);
        assert!(!record.verified);
    }
}
