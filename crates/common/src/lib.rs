// ================
// common/src/lib.rs
// ================
//! Common types shared by the attempt store, its storage backends and
//! the callers that inspect stored attempts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a stored attempt
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct AttemptId(Uuid);

impl AttemptId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for AttemptId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A single recorded login failure.
///
/// Attempts are never modified once stored: they are created by the
/// store and later deleted, either by a reset for their address and
/// action or by a cleanup once they have expired.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    id: AttemptId,
    /// Canonical textual form of the client address
    address: String,
    /// Throttled operation, e.g. "login"
    action: String,
    /// The attempt stops counting toward the limit after this instant
    expires_at: DateTime<Utc>,
    /// Set once by the store when the attempt is recorded
    created_at: DateTime<Utc>,
}

impl Attempt {
    /// Rebuild an attempt from its stored columns.
    pub fn from_parts(
        id: AttemptId,
        address: String,
        action: String,
        expires_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            address,
            action,
            expires_at,
            created_at,
        }
    }

    pub fn id(&self) -> AttemptId {
        self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether the attempt still counts toward the limit at `now`.
    /// An attempt expiring exactly at `now` is still live.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at >= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample(now: DateTime<Utc>) -> Attempt {
        Attempt::from_parts(
            AttemptId::new(),
            "203.0.113.5".to_string(),
            "login".to_string(),
            now + Duration::minutes(5),
            now,
        )
    }

    #[test]
    fn test_attempt_liveness_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let attempt = sample(now);

        assert!(attempt.is_live_at(now));
        assert!(attempt.is_live_at(attempt.expires_at()));
        assert!(!attempt.is_live_at(attempt.expires_at() + Duration::nanoseconds(1)));
    }

    #[test]
    fn test_attempt_serializes_as_flat_record() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let attempt = sample(now);

        let value = serde_json::to_value(&attempt).unwrap();
        assert_eq!(value["address"], "203.0.113.5");
        assert_eq!(value["action"], "login");
        assert_eq!(value["id"], attempt.id().to_string());

        let back: Attempt = serde_json::from_value(value).unwrap();
        assert_eq!(back, attempt);
    }

    #[test]
    fn test_attempt_id_parse() {
        let id = AttemptId::new();
        let parsed: AttemptId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<AttemptId>().is_err());
    }
}
