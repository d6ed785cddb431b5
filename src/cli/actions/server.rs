use crate::api::{
    self,
    email::{EmailSender, EmailWorkerConfig, LogEmailSender, SmtpEmailSender},
    handlers::auth::AuthConfig,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub frontend_origin: String,
    pub otp_ttl_seconds: i64,
    pub reset_ttl_seconds: i64,
    pub resend_cooldown_seconds: i64,
    pub token_ttl_seconds: i64,
    pub email_outbox_poll_seconds: u64,
    pub email_outbox_batch_size: usize,
    pub email_outbox_max_attempts: u32,
    pub email_outbox_backoff_base_seconds: u64,
    pub email_outbox_backoff_max_seconds: u64,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretString>,
    pub smtp_from: String,
}

/// Execute the server action.
///
/// # Errors
/// Returns an error if the SMTP sender cannot be built or the server fails to
/// start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = AuthConfig::new(args.frontend_origin, args.jwt_secret)
        .with_otp_ttl_seconds(args.otp_ttl_seconds)
        .with_reset_ttl_seconds(args.reset_ttl_seconds)
        .with_resend_cooldown_seconds(args.resend_cooldown_seconds)
        .with_token_ttl_seconds(args.token_ttl_seconds);

    let email_config = EmailWorkerConfig::new()
        .with_poll_interval_seconds(args.email_outbox_poll_seconds)
        .with_batch_size(args.email_outbox_batch_size)
        .with_max_attempts(args.email_outbox_max_attempts)
        .with_backoff_base_seconds(args.email_outbox_backoff_base_seconds)
        .with_backoff_max_seconds(args.email_outbox_backoff_max_seconds);

    let sender: Arc<dyn EmailSender> = match &args.smtp_host {
        Some(host) => Arc::new(
            SmtpEmailSender::new(
                host,
                args.smtp_port,
                args.smtp_username.as_deref(),
                args.smtp_password.as_ref(),
                &args.smtp_from,
            )
            .context("Failed to build SMTP sender")?,
        ),
        None => {
            info!("No SMTP relay configured, outbound mail will be logged");
            Arc::new(LogEmailSender)
        }
    };

    api::new(args.port, args.dsn, auth_config, email_config, sender).await
}
