//! Forgot-password and reset-password endpoints.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::credentials::hash_password;
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::AuthState;
use super::storage::{
    ResetRequestOutcome, lookup_reset, save_reset_code, update_password,
};
use super::types::{ForgotPasswordRequest, MessageResponse, ResetPasswordRequest};
use super::utils::{
    CodeCheck, check_code, extract_client_ip, generate_otp, normalize_email, reply, server_error,
};

const MIN_PASSWORD_CHARS: usize = 8;

#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset code queued", body = MessageResponse),
        (status = 400, description = "Missing email", body = MessageResponse),
        (status = 404, description = "Unknown email", body = MessageResponse),
        (status = 429, description = "Rate limited", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> impl IntoResponse {
    let request: ForgotPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return reply(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    if request.email.trim().is_empty() {
        return reply(StatusCode::BAD_REQUEST, "Email is required");
    }

    let email = normalize_email(&request.email);

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::ForgotPassword)
        == RateLimitDecision::Limited
        || auth_state
            .rate_limiter()
            .check_email(&email, RateLimitAction::ForgotPassword)
            == RateLimitDecision::Limited
    {
        return reply(StatusCode::TOO_MANY_REQUESTS, "Rate limited");
    }

    let code = generate_otp();
    match save_reset_code(&pool, &email, &code, auth_state.config()).await {
        Ok(ResetRequestOutcome::Queued) => reply(StatusCode::OK, "Reset code sent to email"),
        Ok(ResetRequestOutcome::NotFound) => reply(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => {
            error!("Failed to save reset code: {err}");
            server_error()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Validation failed, or invalid/expired code", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    pool: Extension<PgPool>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let request: ResetPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return reply(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    if request.email.trim().is_empty()
        || request.code.trim().is_empty()
        || request.new_password.is_empty()
        || request.confirm_password.is_empty()
    {
        return reply(
            StatusCode::BAD_REQUEST,
            "Email, code, new password and confirm password are required",
        );
    }

    if request.new_password.chars().count() < MIN_PASSWORD_CHARS {
        return reply(
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters long",
        );
    }

    if request.new_password != request.confirm_password {
        return reply(
            StatusCode::BAD_REQUEST,
            "Password and confirm password do not match",
        );
    }

    let email = normalize_email(&request.email);

    let record = match lookup_reset(&pool, &email).await {
        Ok(Some(record)) => record,
        Ok(None) => return reply(StatusCode::BAD_REQUEST, "User not found"),
        Err(err) => {
            error!("Failed to lookup reset state: {err}");
            return server_error();
        }
    };

    match check_code(
        record.code.as_deref(),
        record.expires_at,
        &request.code,
        Utc::now(),
    ) {
        CodeCheck::Mismatch => return reply(StatusCode::BAD_REQUEST, "Invalid reset code"),
        CodeCheck::Expired => return reply(StatusCode::BAD_REQUEST, "Reset code expired"),
        CodeCheck::Valid => {}
    }

    let password_hash = match hash_password(&request.new_password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return server_error();
        }
    };

    match update_password(&pool, &email, &password_hash, request.code.trim()).await {
        Ok(true) => reply(StatusCode::OK, "Password reset successful"),
        // A concurrent reset consumed the code between lookup and update.
        Ok(false) => reply(StatusCode::BAD_REQUEST, "Invalid reset code"),
        Err(err) => {
            error!("Failed to update password: {err}");
            server_error()
        }
    }
}
