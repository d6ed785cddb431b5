//! Session token creation and verification.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{state::AuthConfig, types::Role};

/// Claims embedded in a session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account id
    pub sub: Uuid,
    /// Account role, fixed at signup
    pub role: Role,
    /// Issued at
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
}

impl SessionClaims {
    fn new(account_id: Uuid, role: Role, config: &AuthConfig) -> Self {
        let now = Utc::now();
        let exp = now + Duration::seconds(config.token_ttl_seconds());

        Self {
            sub: account_id,
            role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        }
    }
}

/// Sign a session token for a freshly authenticated account.
///
/// # Errors
/// Returns an error if signing fails.
pub(super) fn create_session_token(
    account_id: Uuid,
    role: Role,
    config: &AuthConfig,
) -> Result<String> {
    let claims = SessionClaims::new(account_id, role, config);
    let key = EncodingKey::from_secret(config.jwt_secret().expose_secret().as_bytes());
    encode(&Header::default(), &claims, &key).context("failed to sign session token")
}

/// Verify and decode a session token.
///
/// # Errors
/// Returns an error for malformed, forged, or expired tokens.
pub fn verify_session_token(token: &str, config: &AuthConfig) -> Result<SessionClaims> {
    let key = DecodingKey::from_secret(config.jwt_secret().expose_secret().as_bytes());
    let data = decode::<SessionClaims>(token, &key, &Validation::default())
        .context("invalid session token")?;
    Ok(data.claims)
}
