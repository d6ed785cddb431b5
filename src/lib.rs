//! # Frago Accounts Service
//!
//! Backend API for the Frago marketplace: account signup with buyer/vendor
//! roles, email ownership proof via one-time codes, login with signed session
//! tokens, and password reset.
//!
//! ## Verification model
//!
//! Accounts are created `verified = false` together with a six-digit code and
//! its expiry, stored on the account row itself so verification survives
//! restarts and works across instances. A code is single-use: the verifying
//! update clears it atomically. Password resets follow the same shape with a
//! separate pair of transient fields, so an in-flight signup verification and
//! a reset request never collide.
//!
//! ## Email delivery
//!
//! Outbound mail goes through a transactional outbox: the signup transaction
//! commits the account and the pending email together, and a background
//! worker delivers outbox rows with retry and backoff. A failed delivery never
//! rolls back an account; clients recover through `/api/auth/resend-otp`.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
