//! Signup endpoints for buyer and vendor accounts.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::credentials::hash_password;
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::AuthState;
use super::storage::{NewAccount, SignupOutcome, create_account};
use super::types::{MessageResponse, Role, SignupRequest};
use super::utils::{
    extract_client_ip, generate_otp, normalize_email, reply, server_error, valid_email,
};

#[utoipa::path(
    post,
    path = "/api/auth/signup/buyer",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Buyer registered, OTP queued", body = MessageResponse),
        (status = 400, description = "Missing or invalid fields", body = MessageResponse),
        (status = 409, description = "Email already registered", body = MessageResponse),
        (status = 429, description = "Rate limited", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn signup_buyer(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    signup(Role::Buyer, headers, pool, auth_state, payload).await
}

#[utoipa::path(
    post,
    path = "/api/auth/signup/vendor",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Vendor registered, OTP queued", body = MessageResponse),
        (status = 400, description = "Missing or invalid fields", body = MessageResponse),
        (status = 409, description = "Email already registered", body = MessageResponse),
        (status = 429, description = "Rate limited", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn signup_vendor(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    signup(Role::Vendor, headers, pool, auth_state, payload).await
}

async fn signup(
    role: Role,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SignupRequest>>,
) -> Response {
    let request: SignupRequest = match payload {
        Some(Json(payload)) => payload,
        None => return reply(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let full_name = request.full_name.trim();
    if full_name.is_empty() || request.email.trim().is_empty() || request.password.is_empty() {
        return reply(StatusCode::BAD_REQUEST, "Required fields missing");
    }

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return reply(StatusCode::BAD_REQUEST, "Invalid email");
    }

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Signup)
        == RateLimitDecision::Limited
        || auth_state
            .rate_limiter()
            .check_email(&email, RateLimitAction::Signup)
            == RateLimitDecision::Limited
    {
        return reply(StatusCode::TOO_MANY_REQUESTS, "Rate limited");
    }

    let password_hash = match hash_password(&request.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return server_error();
        }
    };

    let code = generate_otp();
    let account = NewAccount {
        full_name,
        email: &email,
        phone: request.phone.as_deref().map(str::trim),
        address: request.address.as_deref().map(str::trim),
        password_hash: &password_hash,
        role,
        code: &code,
    };

    match create_account(&pool, &account, auth_state.config()).await {
        Ok(SignupOutcome::Created) => reply(
            StatusCode::CREATED,
            &format!("{} registered. OTP sent to email.", role.label()),
        ),
        Ok(SignupOutcome::Conflict) => {
            reply(StatusCode::CONFLICT, "Email already registered")
        }
        Err(err) => {
            error!("Failed to create account: {err}");
            server_error()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{auth_state, body_message, lazy_pool};
    use super::*;

    #[tokio::test]
    async fn signup_missing_payload() {
        let response = signup_buyer(HeaderMap::new(), lazy_pool(), auth_state(), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn signup_missing_required_fields() {
        let request = SignupRequest {
            full_name: " ".to_string(),
            email: "a@b.com".to_string(),
            password: "pw123456".to_string(),
            phone: None,
            address: None,
        };
        let response = signup_vendor(
            HeaderMap::new(),
            lazy_pool(),
            auth_state(),
            Some(Json(request)),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_message(response).await, "Required fields missing");
    }

    #[tokio::test]
    async fn signup_invalid_email() {
        let request = SignupRequest {
            full_name: "A B".to_string(),
            email: "not-an-email".to_string(),
            password: "pw123456".to_string(),
            phone: None,
            address: None,
        };
        let response = signup_buyer(
            HeaderMap::new(),
            lazy_pool(),
            auth_state(),
            Some(Json(request)),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_message(response).await, "Invalid email");
    }
}
