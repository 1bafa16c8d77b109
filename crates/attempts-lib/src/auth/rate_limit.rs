// ============================
// crates/attempts-lib/src/auth/rate_limit.rs
// ============================
//! Rate limiting for authentication attempts.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

use crate::error::{AttemptError, Result};
use crate::store::AttemptStore;

/// Default number of failed attempts before rate limiting
pub const DEFAULT_MAX_ATTEMPTS: u64 = 5;

/// Default lockout duration (5 minutes)
pub const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_secs(5 * 60);

/// What a check answers when the attempt store cannot be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Deny the login
    #[default]
    FailClosed,
    /// Allow the login
    FailOpen,
}

/// Login throttle for one action, backed by an [`AttemptStore`].
///
/// The authentication flow calls [`check_rate_limit`](Self::check_rate_limit)
/// before verifying credentials, [`record_failed_attempt`](Self::record_failed_attempt)
/// after a failure and [`record_success`](Self::record_success) after a success.
#[derive(Debug, Clone)]
pub struct LoginThrottle {
    store: AttemptStore,
    action: String,
    /// Failed attempts tolerated inside the lockout window
    max_attempts: u64,
    /// How long each failure counts
    lockout_duration: Duration,
    policy: FailurePolicy,
}

impl LoginThrottle {
    /// Create a throttle for `action` with the default limits
    pub fn new(store: AttemptStore, action: impl Into<String>) -> Self {
        Self {
            store,
            action: action.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_duration: DEFAULT_LOCKOUT_DURATION,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_lockout_duration(mut self, lockout_duration: Duration) -> Self {
        self.lockout_duration = lockout_duration;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn store(&self) -> &AttemptStore {
        &self.store
    }

    /// Record a failed authentication attempt
    pub async fn record_failed_attempt(&self, ip: IpAddr) -> Result<()> {
        self.store
            .record_failure(&ip.to_string(), &self.action, self.lockout_duration)
            .await
    }

    /// Record a successful authentication, forgetting earlier failures
    pub async fn record_success(&self, ip: IpAddr) -> Result<u64> {
        self.store.reset(&ip.to_string(), &self.action).await
    }

    /// Check if an IP is allowed to attempt authentication.
    ///
    /// Storage failures are answered by the failure policy; invalid input
    /// is still returned as an error.
    pub async fn check_rate_limit(&self, ip: IpAddr) -> Result<bool> {
        match self
            .store
            .is_under_limit(&ip.to_string(), &self.action, self.max_attempts)
            .await
        {
            Ok(true) => Ok(true),
            Ok(false) => {
                tracing::info!(%ip, action = %self.action, "IP locked out for authentication attempts");
                Ok(false)
            },
            Err(AttemptError::Store(e)) => {
                let allowed = self.policy == FailurePolicy::FailOpen;
                tracing::warn!(
                    %ip,
                    action = %self.action,
                    error = %e,
                    policy = ?self.policy,
                    allowed,
                    "attempt store unavailable during rate limit check"
                );
                Ok(allowed)
            },
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::storage::{AttemptBackend, AttemptFilter, MemoryBackend};
    use async_trait::async_trait;
    use login_attempts_common::Attempt;
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    struct DownBackend;

    #[async_trait]
    impl AttemptBackend for DownBackend {
        fn name(&self) -> &'static str {
            "down"
        }

        async fn insert(&self, _attempt: &Attempt) -> std::result::Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn count(&self, _filter: &AttemptFilter) -> std::result::Result<u64, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn delete(&self, _filter: &AttemptFilter) -> std::result::Result<u64, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    fn throttle() -> LoginThrottle {
        LoginThrottle::new(AttemptStore::new(Arc::new(MemoryBackend::new())), "login")
    }

    #[tokio::test]
    async fn test_rate_limiter_blocks_after_max_attempts() {
        let limiter = throttle();
        let ip = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 2));

        for _ in 0..DEFAULT_MAX_ATTEMPTS - 1 {
            limiter.record_failed_attempt(ip).await.unwrap();
        }
        assert!(limiter.check_rate_limit(ip).await.unwrap());

        limiter.record_failed_attempt(ip).await.unwrap();
        assert!(!limiter.check_rate_limit(ip).await.unwrap());
    }

    #[tokio::test]
    async fn test_rate_limiter_resets_after_success() {
        let limiter = throttle().with_max_attempts(2);
        let ip = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 3));

        limiter.record_failed_attempt(ip).await.unwrap();
        limiter.record_failed_attempt(ip).await.unwrap();
        assert!(!limiter.check_rate_limit(ip).await.unwrap());

        assert_eq!(limiter.record_success(ip).await.unwrap(), 2);
        assert!(limiter.check_rate_limit(ip).await.unwrap());
    }

    #[tokio::test]
    async fn test_actions_tracked_separately() {
        let store = AttemptStore::new(Arc::new(MemoryBackend::new()));
        let login = LoginThrottle::new(store.clone(), "login").with_max_attempts(1);
        let admin = LoginThrottle::new(store, "admin").with_max_attempts(1);
        let ip = IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1));

        login.record_failed_attempt(ip).await.unwrap();
        assert!(!login.check_rate_limit(ip).await.unwrap());
        assert!(admin.check_rate_limit(ip).await.unwrap());
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed_by_default() {
        let limiter = LoginThrottle::new(AttemptStore::new(Arc::new(DownBackend)), "login");
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

        assert!(!limiter.check_rate_limit(ip).await.unwrap());
        // recording and resetting still surface the failure
        assert!(limiter.record_failed_attempt(ip).await.unwrap_err().is_store());
        assert!(limiter.record_success(ip).await.unwrap_err().is_store());
    }

    #[tokio::test]
    async fn test_store_failure_can_fail_open() {
        let limiter = LoginThrottle::new(AttemptStore::new(Arc::new(DownBackend)), "login")
            .with_failure_policy(FailurePolicy::FailOpen);
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

        assert!(limiter.check_rate_limit(ip).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_action_is_not_masked_by_policy() {
        let limiter = LoginThrottle::new(AttemptStore::new(Arc::new(DownBackend)), "")
            .with_failure_policy(FailurePolicy::FailOpen);
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

        assert!(limiter.check_rate_limit(ip).await.unwrap_err().is_validation());
    }
}
