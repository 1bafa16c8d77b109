// ============================
// crates/attempts-lib/src/validation/mod.rs
// ============================
//! Input validation for attempt records.

use regex::Regex;
use std::net::IpAddr;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

const MAX_ACTION_LENGTH: usize = 255;

// "+5 minutes", "1 hour", "30s", "2 days"
static DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\+?\s*(\d+)\s*(s|secs?|seconds?|m|mins?|minutes?|h|hrs?|hours?|d|days?|w|weeks?)$",
    )
    .unwrap()
});

/// Possible validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),

    #[error("Action must not be empty")]
    EmptyAction,

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a client address and return it parsed.
///
/// Only bare IPv4/IPv6 literals are accepted. Surrounding whitespace is
/// rejected rather than trimmed.
pub fn validate_address(address: &str) -> ValidationResult<IpAddr> {
    if address.is_empty() {
        return Err(ValidationError::InvalidAddress(
            "address must not be empty".to_string(),
        ));
    }

    address
        .parse::<IpAddr>()
        .map_err(|_| ValidationError::InvalidAddress(address.to_string()))
}

/// Canonical textual form used as the stored address
pub fn canonical_address(address: &str) -> ValidationResult<String> {
    validate_address(address).map(|ip| ip.to_string())
}

/// Validate an action identifier
pub fn validate_action(action: &str) -> ValidationResult<&str> {
    if action.is_empty() {
        return Err(ValidationError::EmptyAction);
    }

    if action.len() > MAX_ACTION_LENGTH {
        return Err(ValidationError::InvalidAction(format!(
            "action cannot exceed {MAX_ACTION_LENGTH} characters"
        )));
    }

    if action.trim() != action {
        return Err(ValidationError::InvalidAction(
            "action must not start or end with whitespace".to_string(),
        ));
    }

    if action.chars().any(char::is_control) {
        return Err(ValidationError::InvalidAction(
            "action contains control characters".to_string(),
        ));
    }

    Ok(action)
}

/// Parse a relative duration such as `"+5 minutes"` or `"30s"`.
pub fn parse_duration(input: &str) -> ValidationResult<Duration> {
    let invalid = || ValidationError::InvalidDuration(input.to_string());

    let caps = DURATION_REGEX.captures(input.trim()).ok_or_else(invalid)?;
    let amount: u64 = caps[1].parse().map_err(|_| invalid())?;
    if amount == 0 {
        return Err(invalid());
    }

    let unit = caps[2].to_ascii_lowercase();
    let unit_secs: u64 = match unit.chars().next() {
        Some('s') => 1,
        Some('m') => 60,
        Some('h') => 60 * 60,
        Some('d') => 24 * 60 * 60,
        Some('w') => 7 * 24 * 60 * 60,
        _ => return Err(invalid()),
    };

    amount
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

/// Convert a lifetime into the signed duration added to the clock.
pub fn to_chrono(duration: Duration) -> ValidationResult<chrono::Duration> {
    chrono::Duration::from_std(duration)
        .map_err(|_| ValidationError::InvalidDuration(format!("{duration:?} is out of range")))
}
