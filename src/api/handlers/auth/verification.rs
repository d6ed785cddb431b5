//! OTP verification and resend endpoints.

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

use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::AuthState;
use super::storage::{
    ResendOutcome, lookup_verification, mark_verified, refresh_verification_code,
};
use super::types::{MessageResponse, ResendOtpRequest, VerifyOtpRequest};
use super::utils::{
    CodeCheck, check_code, extract_client_ip, generate_otp, normalize_email, reply, server_error,
};

#[utoipa::path(
    post,
    path = "/api/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Email verified (or already verified)", body = MessageResponse),
        (status = 400, description = "Invalid or expired OTP", body = MessageResponse),
        (status = 404, description = "Unknown email", body = MessageResponse),
        (status = 429, description = "Rate limited", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> impl IntoResponse {
    let request: VerifyOtpRequest = match payload {
        Some(Json(payload)) => payload,
        None => return reply(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    if request.email.trim().is_empty() || request.otp.trim().is_empty() {
        return reply(StatusCode::BAD_REQUEST, "Email and OTP are required");
    }

    let email = normalize_email(&request.email);

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::VerifyOtp)
        == RateLimitDecision::Limited
        || auth_state
            .rate_limiter()
            .check_email(&email, RateLimitAction::VerifyOtp)
            == RateLimitDecision::Limited
    {
        return reply(StatusCode::TOO_MANY_REQUESTS, "Rate limited");
    }

    let record = match lookup_verification(&pool, &email).await {
        Ok(Some(record)) => record,
        Ok(None) => return reply(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => {
            error!("Failed to lookup verification state: {err}");
            return server_error();
        }
    };

    // Idempotent replay after success gets its own answer, before any code
    // comparison.
    if record.verified {
        return reply(StatusCode::OK, "Email already verified");
    }

    match check_code(
        record.code.as_deref(),
        record.expires_at,
        &request.otp,
        Utc::now(),
    ) {
        CodeCheck::Mismatch => reply(StatusCode::BAD_REQUEST, "Invalid OTP"),
        CodeCheck::Expired => reply(StatusCode::BAD_REQUEST, "OTP expired"),
        CodeCheck::Valid => match mark_verified(&pool, &email, request.otp.trim()).await {
            Ok(true) => reply(StatusCode::OK, "Email verified successfully"),
            // A concurrent verify consumed the code between lookup and update.
            Ok(false) => reply(StatusCode::BAD_REQUEST, "Invalid OTP"),
            Err(err) => {
                error!("Failed to mark account verified: {err}");
                server_error()
            }
        },
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/resend-otp",
    request_body = ResendOtpRequest,
    responses(
        (status = 200, description = "OTP queued, within cooldown, or already verified", body = MessageResponse),
        (status = 400, description = "Missing email", body = MessageResponse),
        (status = 404, description = "Unknown email", body = MessageResponse),
        (status = 429, description = "Rate limited", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn resend_otp(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResendOtpRequest>>,
) -> impl IntoResponse {
    let request: ResendOtpRequest = match payload {
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
        .check_ip(client_ip.as_deref(), RateLimitAction::ResendOtp)
        == RateLimitDecision::Limited
        || auth_state
            .rate_limiter()
            .check_email(&email, RateLimitAction::ResendOtp)
            == RateLimitDecision::Limited
    {
        return reply(StatusCode::TOO_MANY_REQUESTS, "Rate limited");
    }

    let code = generate_otp();
    match refresh_verification_code(&pool, &email, &code, auth_state.config()).await {
        // Cooldown is a silent noop; the last code is still valid.
        Ok(ResendOutcome::Queued | ResendOutcome::Cooldown) => {
            reply(StatusCode::OK, "OTP sent to email.")
        }
        Ok(ResendOutcome::AlreadyVerified) => reply(StatusCode::OK, "Email already verified"),
        Ok(ResendOutcome::NotFound) => reply(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => {
            error!("Failed to resend verification code: {err}");
            server_error()
        }
    }
}
