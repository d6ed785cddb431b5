//! Email outbox worker and delivery.
//!
//! Signup, resend, and forgot-password flows never talk to a mail relay
//! directly: they enqueue a row in `email_outbox` inside the same transaction
//! that mutates the account. A background task periodically polls that table,
//! locks a batch via `FOR UPDATE SKIP LOCKED`, renders the message from its
//! template and JSON payload, and hands it to an [`EmailSender`].
//!
//! Failed rows are retried with exponential backoff and jitter until a max
//! attempt threshold is reached, then marked `failed`. An account is therefore
//! never lost to a mail outage; the worst case is a delayed code, recoverable
//! through the resend endpoint.
//!
//! The default sender for local dev is [`LogEmailSender`], which logs and
//! returns `Ok(())`. [`SmtpEmailSender`] delivers through an SMTP relay.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

pub(crate) const TEMPLATE_VERIFY_OTP: &str = "verify_otp";
pub(crate) const TEMPLATE_RESET_CODE: &str = "reset_code";

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub template: String,
    pub payload_json: String,
}

/// Email delivery abstraction used by the outbox worker.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error to schedule a retry.
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            template = %message.template,
            payload = %message.payload_json,
            "email outbox send stub"
        );
        Ok(())
    }
}

/// Delivers rendered messages through an SMTP relay (STARTTLS).
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    /// Build a sender for the given relay.
    ///
    /// # Errors
    /// Returns an error if the relay host or the from mailbox is invalid.
    pub fn new(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&SecretString>,
        from: &str,
    ) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .with_context(|| format!("Invalid SMTP relay host: {host}"))?
            .port(port);

        if let (Some(username), Some(password)) = (username, password) {
            builder = builder.credentials(Credentials::new(
                username.to_string(),
                password.expose_secret().to_string(),
            ));
        }

        let from = from
            .parse::<Mailbox>()
            .with_context(|| format!("Invalid from mailbox: {from}"))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let payload: Value = serde_json::from_str(&message.payload_json)
            .context("invalid email payload JSON")?;
        let rendered = render(&message.template, &payload)?;

        let to = message
            .to_email
            .parse::<Mailbox>()
            .with_context(|| format!("Invalid recipient: {}", message.to_email))?;

        let mail = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(rendered.subject)
            .header(ContentType::TEXT_HTML)
            .body(rendered.html)
            .context("failed to build email message")?;

        self.transport
            .send(mail)
            .await
            .context("failed to send email via SMTP")?;

        Ok(())
    }
}

pub(crate) struct RenderedEmail {
    pub(crate) subject: String,
    pub(crate) html: String,
}

/// Render a template and its payload into subject + HTML body.
///
/// The validity window always comes from the payload so the copy matches the
/// enforced expiry.
pub(crate) fn render(template: &str, payload: &Value) -> Result<RenderedEmail> {
    let code = payload
        .get("code")
        .and_then(Value::as_str)
        .context("email payload is missing code")?;
    let ttl_minutes = payload
        .get("ttl_minutes")
        .and_then(Value::as_i64)
        .context("email payload is missing ttl_minutes")?;

    match template {
        TEMPLATE_VERIFY_OTP => Ok(RenderedEmail {
            subject: "FRAGO Email Verification OTP".to_string(),
            html: format!(
                "<p>Your OTP is <b>{code}</b>. It is valid for {ttl_minutes} minutes.</p>"
            ),
        }),
        TEMPLATE_RESET_CODE => Ok(RenderedEmail {
            subject: "FRAGO Password Reset Code".to_string(),
            html: format!(
                r#"<div style="font-family: Arial, sans-serif; background:#f6f8fb; padding:30px;">
    <div style="max-width:600px; margin:auto; background:#ffffff; padding:30px; border-radius:8px;">
        <h2 style="color:#222;">Password Reset Request</h2>
        <p>Hello,</p>
        <p>We received a request to reset your password.</p>
        <div style="text-align:center; margin:30px 0;">
            <span style="font-size:32px; letter-spacing:6px; font-weight:bold; color:#1a73e8;">{code}</span>
        </div>
        <p>This code is valid for <strong>{ttl_minutes} minutes</strong>.</p>
        <p>If you did not request this, you can safely ignore this email.</p>
    </div>
</div>"#
            ),
        }),
        other => Err(anyhow!("unknown email template: {other}")),
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EmailWorkerConfig {
    poll_interval: Duration,
    batch_size: usize,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl EmailWorkerConfig {
    /// Default worker config: 5s poll interval, 10 messages per batch,
    /// 5 max attempts, and 5s->5m exponential backoff with jitter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 10,
            max_attempts: 5,
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
        }
    }

    #[must_use]
    pub fn with_poll_interval_seconds(mut self, seconds: u64) -> Self {
        self.poll_interval = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_backoff_base_seconds(mut self, seconds: u64) -> Self {
        self.backoff_base = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_backoff_max_seconds(mut self, seconds: u64) -> Self {
        self.backoff_max = Duration::from_secs(seconds);
        self
    }

    /// Clamp nonsensical values (zero intervals, empty batches) to workable ones.
    #[must_use]
    pub fn normalize(self) -> Self {
        let poll_interval = if self.poll_interval.is_zero() {
            Duration::from_secs(1)
        } else {
            self.poll_interval
        };
        let batch_size = self.batch_size.max(1);
        let max_attempts = self.max_attempts.max(1);
        let backoff_base = if self.backoff_base.is_zero() {
            Duration::from_secs(1)
        } else {
            self.backoff_base
        };
        let backoff_max = self.backoff_max.max(backoff_base);
        Self {
            poll_interval,
            batch_size,
            max_attempts,
            backoff_base,
            backoff_max,
        }
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        self.backoff_base
    }

    #[must_use]
    pub fn backoff_max(&self) -> Duration {
        self.backoff_max
    }
}

impl Default for EmailWorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a background task that polls and processes the email outbox.
pub fn spawn_outbox_worker(
    pool: PgPool,
    sender: Arc<dyn EmailSender>,
    config: EmailWorkerConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let config = config.normalize();
        let poll_interval = config.poll_interval();

        loop {
            if let Err(err) = process_outbox_batch(&pool, sender.as_ref(), &config).await {
                error!("email outbox batch failed: {err}");
            }

            sleep(poll_interval).await;
        }
    })
}

async fn process_outbox_batch(
    pool: &PgPool,
    sender: &dyn EmailSender,
    config: &EmailWorkerConfig,
) -> Result<usize> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to start email outbox transaction")?;

    // Grab a locked batch so multiple workers can run without double-sending.
    let query = r"
        SELECT id, to_email, template, payload_json::text AS payload_json, attempts
        FROM email_outbox
        WHERE status = 'pending'
          AND next_attempt_at <= NOW()
        ORDER BY next_attempt_at ASC, created_at ASC
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(i64::try_from(config.batch_size()).unwrap_or(1))
        .fetch_all(&mut *tx)
        .instrument(span)
        .await
        .context("failed to load email outbox batch")?;

    if rows.is_empty() {
        // Commit even on empty to release locks and keep poll loop consistent.
        tx.commit()
            .await
            .context("failed to commit empty outbox batch")?;
        return Ok(0);
    }

    let row_count = rows.len();
    for row in rows {
        let id: Uuid = row.get("id");
        let attempts: i32 = row.get("attempts");
        let attempts = u32::try_from(attempts).unwrap_or(0);
        let message = EmailMessage {
            to_email: row.get("to_email"),
            template: row.get("template"),
            payload_json: row.get("payload_json"),
        };

        match sender.send(&message).await {
            Ok(()) => mark_sent(&mut tx, id, attempts).await?,
            Err(err) => schedule_retry_or_fail(&mut tx, id, attempts, &err, config).await?,
        }
    }

    tx.commit()
        .await
        .context("failed to commit email outbox batch")?;

    Ok(row_count)
}

async fn mark_sent(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    attempts: u32,
) -> Result<()> {
    let attempts = i32::try_from(attempts.saturating_add(1)).unwrap_or(i32::MAX);
    let query = r"
        UPDATE email_outbox
        SET status = 'sent',
            attempts = $2,
            last_error = NULL,
            sent_at = NOW(),
            next_attempt_at = NOW()
        WHERE id = $1
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .bind(attempts)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to update outbox status to sent")?;
    Ok(())
}

async fn schedule_retry_or_fail(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    attempts: u32,
    err: &anyhow::Error,
    config: &EmailWorkerConfig,
) -> Result<()> {
    let next_attempt = attempts.saturating_add(1);
    let attempts_i32 = i32::try_from(next_attempt).unwrap_or(i32::MAX);

    if next_attempt >= config.max_attempts() {
        let query = r"
            UPDATE email_outbox
            SET status = 'failed',
                attempts = $2,
                last_error = $3,
                next_attempt_at = NOW()
            WHERE id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(attempts_i32)
            .bind(err.to_string())
            .execute(&mut **tx)
            .instrument(span)
            .await
            .context("failed to update outbox status to failed")?;
        return Ok(());
    }

    let delay = backoff_delay(next_attempt, config.backoff_base(), config.backoff_max());
    let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
    let query = r"
        UPDATE email_outbox
        SET status = 'pending',
            attempts = $2,
            last_error = $3,
            next_attempt_at = NOW() + ($4 * INTERVAL '1 millisecond')
        WHERE id = $1
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .bind(attempts_i32)
        .bind(err.to_string())
        .bind(delay_ms)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to update outbox retry schedule")?;

    Ok(())
}

fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    let factor = 1u32 << shift;
    let delay = base.checked_mul(factor).unwrap_or(max);
    let capped = if delay > max { max } else { delay };
    jitter_delay(capped)
}

fn jitter_delay(delay: Duration) -> Duration {
    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if delay_ms < 2 {
        return delay;
    }
    let half = delay_ms / 2;
    let jitter = rand::thread_rng().gen_range(0..=half);
    Duration::from_millis(half + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn config_normalize_clamps_zeroes() {
        let config = EmailWorkerConfig::new()
            .with_poll_interval_seconds(0)
            .with_batch_size(0)
            .with_max_attempts(0)
            .with_backoff_base_seconds(0)
            .with_backoff_max_seconds(0)
            .normalize();

        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.batch_size(), 1);
        assert_eq!(config.max_attempts(), 1);
        assert_eq!(config.backoff_base(), Duration::from_secs(1));
        assert!(config.backoff_max() >= config.backoff_base());
    }

    #[test]
    fn backoff_grows_and_caps() {
        let base = Duration::from_secs(5);
        let max = Duration::from_secs(300);

        for attempt in 1..=10 {
            let delay = backoff_delay(attempt, base, max);
            assert!(delay <= max, "attempt {attempt} exceeded the cap");
        }

        // Deep attempts must not overflow the shift.
        let delay = backoff_delay(u32::MAX, base, max);
        assert!(delay <= max);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let delay = Duration::from_millis(1000);
        for _ in 0..100 {
            let jittered = jitter_delay(delay);
            assert!(jittered >= Duration::from_millis(500));
            assert!(jittered <= delay);
        }
    }

    #[test]
    fn render_verify_otp_uses_configured_window() {
        let payload = json!({"email": "a@b.com", "code": "123456", "ttl_minutes": 10});
        let rendered = render(TEMPLATE_VERIFY_OTP, &payload).expect("render");
        assert_eq!(rendered.subject, "FRAGO Email Verification OTP");
        assert!(rendered.html.contains("123456"));
        assert!(rendered.html.contains("10 minutes"));
    }

    #[test]
    fn render_reset_code_contains_code() {
        let payload = json!({"email": "a@b.com", "code": "654321", "ttl_minutes": 10});
        let rendered = render(TEMPLATE_RESET_CODE, &payload).expect("render");
        assert_eq!(rendered.subject, "FRAGO Password Reset Code");
        assert!(rendered.html.contains("654321"));
        assert!(rendered.html.contains("Password Reset Request"));
    }

    #[test]
    fn render_rejects_unknown_template() {
        let payload = json!({"code": "123456", "ttl_minutes": 10});
        assert!(render("welcome", &payload).is_err());
    }

    #[test]
    fn render_rejects_missing_code() {
        let payload = json!({"ttl_minutes": 10});
        assert!(render(TEMPLATE_VERIFY_OTP, &payload).is_err());
    }

    #[tokio::test]
    async fn log_sender_always_succeeds() {
        let message = EmailMessage {
            to_email: "a@b.com".to_string(),
            template: TEMPLATE_VERIFY_OTP.to_string(),
            payload_json: "{}".to_string(),
        };
        assert!(LogEmailSender.send(&message).await.is_ok());
    }

    #[test]
    fn smtp_sender_rejects_bad_from() {
        let sender = SmtpEmailSender::new("smtp.example.com", 587, None, None, "not a mailbox");
        assert!(sender.is_err());
    }
}
