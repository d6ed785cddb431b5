//! Small helpers shared by the account handlers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;

use super::types::{ErrorResponse, MessageResponse};

/// Normalize an email for lookup/uniqueness checks.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Six-digit code drawn uniformly from [100000, 999999].
pub(super) fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Outcome of comparing a submitted code against the stored one.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum CodeCheck {
    Valid,
    Mismatch,
    Expired,
}

/// Three-way code check: the stored code must exist and match, and `now` must
/// be strictly before the expiry. At exactly the expiry the code is spent.
pub(super) fn check_code(
    stored_code: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    submitted: &str,
    now: DateTime<Utc>,
) -> CodeCheck {
    let Some(code) = stored_code else {
        return CodeCheck::Mismatch;
    };
    if code != submitted.trim() {
        return CodeCheck::Mismatch;
    }
    if let Some(expires_at) = expires_at {
        if now >= expires_at {
            return CodeCheck::Expired;
        }
    }
    CodeCheck::Valid
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Extract a client IP for rate limiting from common proxy headers.
pub(super) fn extract_client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Status + JSON message body, the shape every account endpoint answers with.
pub(super) fn reply(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(MessageResponse {
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// Uniform body for anything unexpected; details stay in the logs.
pub(super) fn server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Something went wrong!".to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};
    use chrono::Duration;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn generate_otp_is_six_digits_in_range() {
        for _ in 0..1000 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().expect("numeric");
            assert!((100_000..=999_999).contains(&value));
        }
    }

    #[test]
    fn check_code_matches_unexpired() {
        let now = Utc::now();
        let expires = Some(now + Duration::seconds(60));
        assert_eq!(
            check_code(Some("123456"), expires, "123456", now),
            CodeCheck::Valid
        );
    }

    #[test]
    fn check_code_trims_submitted() {
        let now = Utc::now();
        assert_eq!(
            check_code(Some("123456"), None, " 123456 ", now),
            CodeCheck::Valid
        );
    }

    #[test]
    fn check_code_rejects_mismatch_and_missing() {
        let now = Utc::now();
        let expires = Some(now + Duration::seconds(60));
        assert_eq!(
            check_code(Some("123456"), expires, "654321", now),
            CodeCheck::Mismatch
        );
        assert_eq!(check_code(None, None, "123456", now), CodeCheck::Mismatch);
    }

    #[test]
    fn check_code_expiry_boundary() {
        let expires = Utc::now();

        // One second before the boundary the code still works.
        assert_eq!(
            check_code(
                Some("123456"),
                Some(expires),
                "123456",
                expires - Duration::seconds(1)
            ),
            CodeCheck::Valid
        );

        // At and past the boundary it is spent.
        assert_eq!(
            check_code(Some("123456"), Some(expires), "123456", expires),
            CodeCheck::Expired
        );
        assert_eq!(
            check_code(
                Some("123456"),
                Some(expires),
                "123456",
                expires + Duration::seconds(1)
            ),
            CodeCheck::Expired
        );
    }

    #[test]
    fn check_code_mismatch_wins_over_expiry() {
        let expires = Utc::now();
        assert_eq!(
            check_code(
                Some("123456"),
                Some(expires),
                "654321",
                expires + Duration::seconds(1)
            ),
            CodeCheck::Mismatch
        );
    }

    #[derive(Debug)]
    struct FakeDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "fake database error")
        }
    }

    impl StdError for FakeDbError {}

    impl DatabaseError for FakeDbError {
        fn message(&self) -> &'static str {
            "fake database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(FakeDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(FakeDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));

        let err = sqlx::Error::RowNotFound;
        assert!(!is_unique_violation(&err));
    }

    #[test]
    fn extract_client_ip_prefers_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), Some("1.2.3.4".to_string()));
    }

    #[test]
    fn extract_client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), Some("9.9.9.9".to_string()));
    }

    #[test]
    fn extract_client_ip_none_when_missing() {
        let headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers), None);
    }
}
