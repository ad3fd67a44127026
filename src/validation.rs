//! Input checks applied before anything is forwarded to the automation engine.
use regex::Regex;
use std::sync::OnceLock;

/// Validate an outbound recipient address.
///
/// Checks for:
/// - Basic email format (contains @ and .)
/// - Minimum length
/// - RFC 5322 simplified structure
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let email_regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
        )
        .expect("email regex is valid")
    });

    if !email_regex.is_match(email) {
        tracing::warn!("Invalid email format: {}", email);
        return false;
    }

    true
}

/// Normalize a sending domain: trims, lowercases and strips a scheme,
/// path or trailing dot. Returns `None` when the result is not a hostname.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let trimmed = raw.trim().to_lowercase();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(&trimmed);
    let host = without_scheme
        .split('/')
        .next()
        .unwrap_or_default()
        .trim_end_matches('.');

    static DOMAIN_REGEX: OnceLock<Regex> = OnceLock::new();
    let domain_regex = DOMAIN_REGEX.get_or_init(|| {
        Regex::new(r"^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}$")
            .expect("domain regex is valid")
    });

    if host.len() > 253 || !domain_regex.is_match(host) {
        return None;
    }

    Some(host.to_string())
}
