// ============================
// crates/attempts-lib/src/store.rs
// ============================
//! The attempt store: record failures, check limits, reset, clean up.

use login_attempts_common::{Attempt, AttemptId};
use ::metrics::counter;
use std::sync::Arc;
use std::time::Duration;

use crate::cleanup::CleanupMode;
use crate::clock::{Clock, SystemClock};
use crate::error::{AttemptError, Result, StoreError};
use crate::metrics::{ATTEMPTS_CLEANED, ATTEMPTS_RESET, ATTEMPT_RECORDED, CHECK_DENIED, STORE_ERRORS};
use crate::storage::{AttemptBackend, AttemptFilter};
use crate::validation::{self, ValidationError};

/// Durable record of recent login failures.
///
/// Every operation is a single statement against the backend; the store
/// adds no locking of its own. A check followed by a record can race with
/// other callers, so the limit is best-effort.
#[derive(Clone)]
pub struct AttemptStore {
    backend: Arc<dyn AttemptBackend>,
    clock: Arc<dyn Clock>,
    cleanup_mode: CleanupMode,
}

impl std::fmt::Debug for AttemptStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptStore")
            .field("backend", &self.backend.name())
            .field("cleanup_mode", &self.cleanup_mode)
            .finish()
    }
}

impl AttemptStore {
    /// Create a store over `backend` using the wall clock
    pub fn new(backend: Arc<dyn AttemptBackend>) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            cleanup_mode: CleanupMode::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cleanup_mode(mut self, mode: CleanupMode) -> Self {
        self.cleanup_mode = mode;
        self
    }

    pub fn cleanup_mode(&self) -> CleanupMode {
        self.cleanup_mode
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Record a failed attempt that counts for `duration` from now.
    pub async fn record_failure(&self, address: &str, action: &str, duration: Duration) -> Result<()> {
        let address = validation::canonical_address(address)?;
        let action = validation::validate_action(action)?;
        let lifetime = validation::to_chrono(duration)?;

        let now = self.clock.now();
        let expires_at = now.checked_add_signed(lifetime).ok_or_else(|| {
            ValidationError::InvalidDuration(format!("{duration:?} overflows the clock"))
        })?;

        let attempt = Attempt::from_parts(
            AttemptId::new(),
            address,
            action.to_string(),
            expires_at,
            now,
        );

        self.track(self.backend.insert(&attempt).await)?;
        counter!(ATTEMPT_RECORDED, "action" => action.to_string()).increment(1);
        tracing::debug!(
            address = attempt.address(),
            action = attempt.action(),
            expires_at = %attempt.expires_at(),
            "recorded failed attempt"
        );
        Ok(())
    }

    /// Like [`record_failure`](Self::record_failure) with a relative
    /// duration such as `"+5 minutes"`.
    pub async fn record_failure_for(&self, address: &str, action: &str, input: &str) -> Result<()> {
        let duration = validation::parse_duration(input)?;
        self.record_failure(address, action, duration).await
    }

    /// Number of attempts for `address` and `action` that have not expired
    pub async fn count(&self, address: &str, action: &str) -> Result<u64> {
        let filter = key_filter(address, action)?.live_at(self.clock.now());
        self.track(self.backend.count(&filter).await)
    }

    /// Whether fewer than `limit` live attempts are recorded.
    ///
    /// Expired attempts never count, whether or not they have been
    /// cleaned up. With [`CleanupMode::Inline`] they are purged first.
    pub async fn is_under_limit(&self, address: &str, action: &str, limit: u64) -> Result<bool> {
        let filter = key_filter(address, action)?;

        if self.cleanup_mode == CleanupMode::Inline {
            self.cleanup().await?;
        }

        let now = self.clock.now();
        let count = self.track(self.backend.count(&filter.live_at(now)).await)?;
        let under = count < limit;

        if !under {
            counter!(CHECK_DENIED, "action" => action.to_string()).increment(1);
        }
        tracing::debug!(address, action, count, limit, under, "checked attempt limit");
        Ok(under)
    }

    /// Delete every attempt for `address` and `action`
    pub async fn reset(&self, address: &str, action: &str) -> Result<u64> {
        let filter = key_filter(address, action)?;
        let removed = self.track(self.backend.delete(&filter).await)?;

        counter!(ATTEMPTS_RESET).increment(removed);
        if removed > 0 {
            tracing::info!(address, action, removed, "reset failed attempts");
        }
        Ok(removed)
    }

    /// Delete every attempt that has expired
    pub async fn cleanup(&self) -> Result<u64> {
        let now = self.clock.now();
        let removed = self.track(self.backend.delete(&AttemptFilter::expired(now)).await)?;

        counter!(ATTEMPTS_CLEANED).increment(removed);
        if removed > 0 {
            tracing::info!(backend = self.backend.name(), removed, "cleaned up expired attempts");
        }
        Ok(removed)
    }

    fn track<T>(&self, result: std::result::Result<T, StoreError>) -> Result<T> {
        result.map_err(|e| {
            counter!(STORE_ERRORS, "backend" => self.backend.name()).increment(1);
            tracing::warn!(backend = self.backend.name(), error = %e, "attempt backend failed");
            AttemptError::from(e)
        })
    }
}

fn key_filter(address: &str, action: &str) -> Result<AttemptFilter> {
    let address = validation::canonical_address(address)?;
    let action = validation::validate_action(action)?;
    Ok(AttemptFilter::for_key(address, action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryBackend;
    use chrono::{TimeZone, Utc};

    const FIVE_MINUTES: Duration = Duration::from_secs(5 * 60);

    fn setup() -> (AttemptStore, MemoryBackend, ManualClock) {
        let backend = MemoryBackend::new();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        let store = AttemptStore::new(Arc::new(backend.clone())).with_clock(Arc::new(clock.clone()));
        (store, backend, clock)
    }

    #[tokio::test]
    async fn test_record_sets_timestamps_from_clock() {
        let (store, backend, clock) = setup();
        store.record_failure("203.0.113.5", "login", FIVE_MINUTES).await.unwrap();

        let rows = backend.snapshot();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].created_at(), clock.now());
        assert_eq!(rows[0].expires_at(), clock.now() + chrono::Duration::minutes(5));
        assert_eq!(rows[0].address(), "203.0.113.5");
        assert_eq!(rows[0].action(), "login");
    }

    #[tokio::test]
    async fn test_record_stores_canonical_address() {
        let (store, backend, _) = setup();
        store.record_failure("::0001", "login", FIVE_MINUTES).await.unwrap();

        assert_eq!(backend.snapshot()[0].address(), "::1");
        assert!(!store.is_under_limit("::1", "login", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_input_persists_nothing() {
        let (store, backend, _) = setup();

        let err = store.record_failure("not-an-ip", "login", FIVE_MINUTES).await.unwrap_err();
        assert!(matches!(err, AttemptError::Validation(ValidationError::InvalidAddress(_))));

        let err = store.record_failure("10.0.0.1", "", FIVE_MINUTES).await.unwrap_err();
        assert!(matches!(err, AttemptError::Validation(ValidationError::EmptyAction)));

        let err = store
            .record_failure("10.0.0.1", "login", Duration::from_secs(u64::MAX))
            .await
            .unwrap_err();
        assert!(matches!(err, AttemptError::Validation(ValidationError::InvalidDuration(_))));

        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_record_failure_for_parses_relative_duration() {
        let (store, backend, clock) = setup();
        store.record_failure_for("10.0.0.1", "login", "+15 minutes").await.unwrap();
        assert_eq!(
            backend.snapshot()[0].expires_at(),
            clock.now() + chrono::Duration::minutes(15)
        );

        let err = store.record_failure_for("10.0.0.1", "login", "soon").await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_limit_zero_always_denies() {
        let (store, _, _) = setup();
        assert!(!store.is_under_limit("10.0.0.1", "login", 0).await.unwrap());
    }

    #[tokio::test]
    async fn test_check_and_reset_validate_input() {
        let (store, _, _) = setup();
        assert!(store.is_under_limit("bogus", "login", 3).await.unwrap_err().is_validation());
        assert!(store.reset("10.0.0.1", "").await.unwrap_err().is_validation());
        assert!(store.count("", "login").await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_attempt_expiring_now_still_counts() {
        let (store, _, clock) = setup();
        store.record_failure("10.0.0.1", "login", FIVE_MINUTES).await.unwrap();

        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(store.count("10.0.0.1", "login").await.unwrap(), 1);
        assert_eq!(store.cleanup().await.unwrap(), 0);

        clock.advance(chrono::Duration::nanoseconds(1));
        assert_eq!(store.count("10.0.0.1", "login").await.unwrap(), 0);
        assert_eq!(store.cleanup().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_manual_mode_check_leaves_expired_rows() {
        let (store, backend, clock) = setup();
        store.record_failure("10.0.0.1", "login", FIVE_MINUTES).await.unwrap();
        clock.advance(chrono::Duration::hours(1));

        assert!(store.is_under_limit("10.0.0.1", "login", 1).await.unwrap());
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_inline_mode_check_purges_expired_rows() {
        let (store, backend, clock) = setup();
        let store = store.with_cleanup_mode(CleanupMode::Inline);
        store.record_failure("10.0.0.1", "login", FIVE_MINUTES).await.unwrap();
        store.record_failure("10.0.0.2", "login", Duration::from_secs(3600)).await.unwrap();
        clock.advance(chrono::Duration::minutes(10));

        assert!(store.is_under_limit("10.0.0.1", "login", 1).await.unwrap());
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.snapshot()[0].address(), "10.0.0.2");
    }
}
