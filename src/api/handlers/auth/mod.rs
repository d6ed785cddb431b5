//! Account and credential handlers.
//!
//! ## Verification lifecycle
//!
//! Signup stores the account with `verified = false` plus a six-digit code and
//! its expiry on the row itself, so verification state survives restarts and
//! is shared by every instance. Verifying consumes the code in a single
//! guarded update; a correct code replayed after consumption is
//! indistinguishable from a wrong one, while an already verified account gets
//! a distinct idempotent answer before any code comparison.
//!
//! Password resets use a separate code/expiry pair on the same row, so a
//! pending signup verification and a reset request never collide.
//!
//! ## Error surface
//!
//! Bad credentials, unknown emails, and wrong roles at login all answer the
//! same generic 401 to keep account enumeration expensive. Unverified accounts
//! get a distinct 403. Anything unexpected is logged and answered with a
//! uniform 500 body.

pub(crate) mod credentials;
pub(crate) mod login;
pub(crate) mod password;
mod rate_limit;
pub(crate) mod signup;
mod state;
mod storage;
pub(crate) mod token;
pub(crate) mod types;
mod utils;
pub(crate) mod verification;

#[cfg(test)]
mod test_support;

pub use rate_limit::NoopRateLimiter;
pub use state::{AuthConfig, AuthState};
