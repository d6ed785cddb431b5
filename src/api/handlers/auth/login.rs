//! Login endpoints for buyer and vendor accounts.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::credentials::verify_password;
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::AuthState;
use super::storage::find_account_by_email;
use super::token::create_session_token;
use super::types::{AccountResponse, LoginRequest, LoginResponse, MessageResponse, Role};
use super::utils::{extract_client_ip, normalize_email, reply, server_error};

#[utoipa::path(
    post,
    path = "/api/auth/login/buyer",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing fields", body = MessageResponse),
        (status = 401, description = "Invalid credentials", body = MessageResponse),
        (status = 403, description = "Email not verified", body = MessageResponse),
        (status = 429, description = "Rate limited", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn login_buyer(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    login(Role::Buyer, headers, pool, auth_state, payload).await
}

#[utoipa::path(
    post,
    path = "/api/auth/login/vendor",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing fields", body = MessageResponse),
        (status = 401, description = "Invalid credentials", body = MessageResponse),
        (status = 403, description = "Email not verified", body = MessageResponse),
        (status = 429, description = "Rate limited", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn login_vendor(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    login(Role::Vendor, headers, pool, auth_state, payload).await
}

async fn login(
    role: Role,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return reply(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    if request.email.trim().is_empty() || request.password.is_empty() {
        return reply(StatusCode::BAD_REQUEST, "Email and password are required");
    }

    let email = normalize_email(&request.email);

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Login)
        == RateLimitDecision::Limited
        || auth_state
            .rate_limiter()
            .check_email(&email, RateLimitAction::Login)
            == RateLimitDecision::Limited
    {
        return reply(StatusCode::TOO_MANY_REQUESTS, "Rate limited");
    }

    let account = match find_account_by_email(&pool, &email).await {
        Ok(account) => account,
        Err(err) => {
            error!("Failed to lookup account: {err}");
            return server_error();
        }
    };

    // Unknown email and wrong role answer identically so callers cannot probe
    // which addresses are registered or under which role.
    let Some(account) = account else {
        return reply(StatusCode::UNAUTHORIZED, "Invalid credentials");
    };
    if account.role != role {
        return reply(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }

    if !account.verified {
        return reply(StatusCode::FORBIDDEN, "Please verify your email first");
    }

    match verify_password(&request.password, &account.password_hash) {
        Ok(true) => {}
        Ok(false) => return reply(StatusCode::UNAUTHORIZED, "Invalid credentials"),
        Err(err) => {
            error!("Failed to verify password: {err}");
            return server_error();
        }
    }

    let token = match create_session_token(account.id, account.role, auth_state.config()) {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to sign session token: {err}");
            return server_error();
        }
    };

    (
        StatusCode::OK,
        Json(LoginResponse {
            message: "Login successful".to_string(),
            token,
            user: AccountResponse {
                id: account.id,
                full_name: account.full_name,
                email: account.email,
                role: account.role,
                phone: account.phone,
                address: account.address,
            },
        }),
    )
        .into_response()
}
