//! # Cruise0 (email verification gate)
//!
//! `cruise0` keeps a user away from the profile view until the hosted identity
//! provider reports their email as verified. Authentication, token issuance and
//! user records all live with the provider; this crate only decides where the
//! user should be and nudges the provider when asked.
//!
//! ## Client side (`gate`)
//!
//! - **Intent Store:** a single durable slot remembering whether the user should
//!   land on `/verify-email` or `/profile` after the next login.
//! - **Verification Poller:** a bounded polling loop that refreshes the session
//!   claims with the cache bypassed, pauses while the view is hidden, and redirects
//!   to `/profile` once the verified flag flips.
//! - **Gatekeeper:** re-evaluates placement on every auth state change and replaces
//!   the history entry with `/verify-email` or `/profile`.
//!
//! ## Server side (`api`)
//!
//! `POST /api/resend-verification` maps the caller's bearer token to its subject
//! through the provider's user-info endpoint, obtains a management token with the
//! client-credentials grant, and submits a verification-email job.

pub mod api;
pub mod cli;
pub mod gate;
pub mod identity;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
