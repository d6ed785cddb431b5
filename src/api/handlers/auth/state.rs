//! Auth state and configuration.

use secrecy::SecretString;
use std::sync::Arc;

use super::rate_limit::RateLimiter;

const DEFAULT_OTP_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_RESET_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_RESEND_COOLDOWN_SECONDS: i64 = 60;
const DEFAULT_TOKEN_TTL_SECONDS: i64 = 8 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_origin: String,
    jwt_secret: SecretString,
    otp_ttl_seconds: i64,
    reset_ttl_seconds: i64,
    resend_cooldown_seconds: i64,
    token_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_origin: String, jwt_secret: SecretString) -> Self {
        Self {
            frontend_origin,
            jwt_secret,
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
            reset_ttl_seconds: DEFAULT_RESET_TTL_SECONDS,
            resend_cooldown_seconds: DEFAULT_RESEND_COOLDOWN_SECONDS,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: i64) -> Self {
        self.otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_resend_cooldown_seconds(mut self, seconds: i64) -> Self {
        self.resend_cooldown_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    pub(crate) fn frontend_origin(&self) -> &str {
        &self.frontend_origin
    }

    pub(super) fn jwt_secret(&self) -> &SecretString {
        &self.jwt_secret
    }

    pub(super) fn otp_ttl_seconds(&self) -> i64 {
        self.otp_ttl_seconds
    }

    pub(super) fn reset_ttl_seconds(&self) -> i64 {
        self.reset_ttl_seconds
    }

    pub(super) fn resend_cooldown_seconds(&self) -> i64 {
        self.resend_cooldown_seconds
    }

    pub(super) fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }
}

pub struct AuthState {
    config: AuthConfig,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            config,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::NoopRateLimiter;
    use super::*;
    use secrecy::{ExposeSecret, SecretString};

    fn config() -> AuthConfig {
        AuthConfig::new(
            "http://localhost:5173".to_string(),
            SecretString::from("test-secret"),
        )
    }

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = config();

        assert_eq!(config.frontend_origin(), "http://localhost:5173");
        assert_eq!(config.otp_ttl_seconds(), DEFAULT_OTP_TTL_SECONDS);
        assert_eq!(config.reset_ttl_seconds(), DEFAULT_RESET_TTL_SECONDS);
        assert_eq!(
            config.resend_cooldown_seconds(),
            DEFAULT_RESEND_COOLDOWN_SECONDS
        );
        assert_eq!(config.token_ttl_seconds(), DEFAULT_TOKEN_TTL_SECONDS);

        let config = config
            .with_otp_ttl_seconds(120)
            .with_reset_ttl_seconds(180)
            .with_resend_cooldown_seconds(30)
            .with_token_ttl_seconds(3600);

        assert_eq!(config.otp_ttl_seconds(), 120);
        assert_eq!(config.reset_ttl_seconds(), 180);
        assert_eq!(config.resend_cooldown_seconds(), 30);
        assert_eq!(config.token_ttl_seconds(), 3600);
    }

    #[test]
    fn auth_config_debug_hides_secret() {
        let config = config();
        let debug = format!("{config:?}");
        assert!(!debug.contains("test-secret"));
        assert_eq!(config.jwt_secret().expose_secret(), "test-secret");
    }

    #[test]
    fn auth_state_exposes_config() {
        let state = AuthState::new(config(), std::sync::Arc::new(NoopRateLimiter));
        assert_eq!(state.config().frontend_origin(), "http://localhost:5173");
    }
}
