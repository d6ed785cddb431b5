//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action executed by the binary.

use crate::cli::actions::{Action, server::Args};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let jwt_secret = matches
        .get_one::<String>("jwt-secret")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --jwt-secret")?;

    let get_i64 = |name: &str| matches.get_one::<i64>(name).copied().unwrap_or_default();
    let get_u64 = |name: &str| matches.get_one::<u64>(name).copied().unwrap_or_default();

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret,
        frontend_origin: matches
            .get_one::<String>("frontend-origin")
            .cloned()
            .unwrap_or_else(|| "http://localhost:5173".to_string()),
        otp_ttl_seconds: get_i64("otp-ttl-seconds"),
        reset_ttl_seconds: get_i64("reset-ttl-seconds"),
        resend_cooldown_seconds: get_i64("resend-cooldown-seconds"),
        token_ttl_seconds: get_i64("token-ttl-seconds"),
        email_outbox_poll_seconds: get_u64("email-outbox-poll-seconds"),
        email_outbox_batch_size: matches
            .get_one::<usize>("email-outbox-batch-size")
            .copied()
            .unwrap_or(10),
        email_outbox_max_attempts: matches
            .get_one::<u32>("email-outbox-max-attempts")
            .copied()
            .unwrap_or(5),
        email_outbox_backoff_base_seconds: get_u64("email-outbox-backoff-base-seconds"),
        email_outbox_backoff_max_seconds: get_u64("email-outbox-backoff-max-seconds"),
        smtp_host: matches.get_one::<String>("smtp-host").cloned(),
        smtp_port: matches.get_one::<u16>("smtp-port").copied().unwrap_or(587),
        smtp_username: matches.get_one::<String>("smtp-username").cloned(),
        smtp_password: matches
            .get_one::<String>("smtp-password")
            .cloned()
            .map(SecretString::from),
        smtp_from: matches
            .get_one::<String>("smtp-from")
            .cloned()
            .unwrap_or_else(|| "FRAGO <no-reply@frago.shop>".to_string()),
    }))
}
