//! HTTP handlers.

pub mod health;
pub mod resend;
pub mod root;

use regex::Regex;

/// Lightweight email sanity check; only used to decide whether to log a hint.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}
