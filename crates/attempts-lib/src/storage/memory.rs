//! In-process backend.
use async_trait::async_trait;
use login_attempts_common::Attempt;
use parking_lot::RwLock;
use std::sync::Arc;

use super::{AttemptBackend, AttemptFilter};
use crate::error::StoreError;

/// Backend keeping attempts in memory. Clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    rows: Arc<RwLock<Vec<Attempt>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored attempt, in insertion order
    pub fn snapshot(&self) -> Vec<Attempt> {
        self.rows.read().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait]
impl AttemptBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, attempt: &Attempt) -> Result<(), StoreError> {
        self.rows.write().push(attempt.clone());
        Ok(())
    }

    async fn count(&self, filter: &AttemptFilter) -> Result<u64, StoreError> {
        let rows = self.rows.read();
        Ok(rows.iter().filter(|a| filter.matches(a)).count() as u64)
    }

    async fn delete(&self, filter: &AttemptFilter) -> Result<u64, StoreError> {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|a| !filter.matches(a));
        Ok((before - rows.len()) as u64)
    }
}
