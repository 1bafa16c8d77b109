// ============================
// crates/attempts-lib/src/storage/mod.rs
// ============================
//! Storage abstraction for attempt records.
//!
//! The store only needs three primitives from a backend: insert one
//! record, count the records matching a filter and delete the records
//! matching a filter. Each call must be atomic on its own; nothing here
//! spans more than one statement.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use login_attempts_common::Attempt;

use crate::error::StoreError;

mod flat_file;
mod memory;
mod sqlite;

pub use flat_file::FlatFileBackend;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// Trait for storage backends
#[async_trait]
pub trait AttemptBackend: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &'static str;

    /// Persist a new attempt
    async fn insert(&self, attempt: &Attempt) -> Result<(), StoreError>;

    /// Count attempts matching `filter`
    async fn count(&self, filter: &AttemptFilter) -> Result<u64, StoreError>;

    /// Delete attempts matching `filter`, returning how many were removed
    async fn delete(&self, filter: &AttemptFilter) -> Result<u64, StoreError>;
}

/// Equality and expiry-range filter over attempts.
///
/// Every constraint that is set must hold; an empty filter matches all
/// attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptFilter {
    pub address: Option<String>,
    pub action: Option<String>,
    /// `expires_at >= t`
    pub live_at: Option<DateTime<Utc>>,
    /// `expires_at < t`
    pub expired_at: Option<DateTime<Utc>>,
}

impl AttemptFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Attempts recorded for one address and action
    pub fn for_key(address: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            action: Some(action.into()),
            ..Self::default()
        }
    }

    /// Attempts that had expired by `now`
    pub fn expired(now: DateTime<Utc>) -> Self {
        Self {
            expired_at: Some(now),
            ..Self::default()
        }
    }

    /// Narrow to attempts still live at `now`
    pub fn live_at(mut self, now: DateTime<Utc>) -> Self {
        self.live_at = Some(now);
        self
    }

    pub fn matches(&self, attempt: &Attempt) -> bool {
        if let Some(address) = &self.address {
            if attempt.address() != address {
                return false;
            }
        }
        if let Some(action) = &self.action {
            if attempt.action() != action {
                return false;
            }
        }
        if let Some(now) = self.live_at {
            if !attempt.is_live_at(now) {
                return false;
            }
        }
        if let Some(now) = self.expired_at {
            if attempt.is_live_at(now) {
                return false;
            }
        }
        true
    }
}
