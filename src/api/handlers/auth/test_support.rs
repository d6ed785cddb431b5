//! Shared fixtures for handler tests.
//!
//! The lazy pool never opens a connection: tests drive only the validation
//! paths that return before any query runs.

use axum::body::to_bytes;
use axum::extract::Extension;
use axum::response::Response;
use secrecy::SecretString;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

use super::{AuthConfig, AuthState, NoopRateLimiter};

pub(super) fn lazy_pool() -> Extension<PgPool> {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://postgres@localhost/postgres")
        .expect("lazy pool");
    Extension(pool)
}

pub(super) fn auth_state() -> Extension<Arc<AuthState>> {
    let config = AuthConfig::new(
        "http://localhost:5173".to_string(),
        SecretString::from("test-secret"),
    );
    Extension(Arc::new(AuthState::new(config, Arc::new(NoopRateLimiter))))
}

pub(super) async fn body_message(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
    value
        .get("message")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string()
}
