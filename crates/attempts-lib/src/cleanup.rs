//! When expired attempts get purged.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::store::AttemptStore;

/// How expired attempts are removed from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CleanupMode {
    /// Only when [`AttemptStore::cleanup`] is called, e.g. from cron
    #[default]
    Manual,
    /// Before every limit check
    Inline,
    /// From a background task every `interval_secs`
    Periodic { interval_secs: u64 },
}

impl CleanupMode {
    pub fn interval(&self) -> Option<Duration> {
        match self {
            CleanupMode::Periodic { interval_secs } => Some(Duration::from_secs(*interval_secs)),
            _ => None,
        }
    }
}

/// Handle to a running cleanup task. Dropping it stops the task.
#[derive(Debug)]
pub struct CleanupTask {
    handle: JoinHandle<()>,
}

impl CleanupTask {
    pub fn stop(self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for CleanupTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Run `store.cleanup()` every `period` until the returned handle is dropped.
///
/// The first run happens one period after spawning. Failures are logged
/// and the loop keeps going. Must be called from within a tokio runtime.
///
/// # Panics
///
/// Panics if `period` is zero.
pub fn spawn_cleanup_task(store: AttemptStore, period: Duration) -> CleanupTask {
    assert!(!period.is_zero(), "cleanup period must be non-zero");

    let handle = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match store.cleanup().await {
                Ok(removed) => {
                    tracing::debug!(removed, "periodic attempt cleanup finished");
                },
                Err(e) => {
                    tracing::warn!(error = %e, "periodic attempt cleanup failed");
                },
            }
        }
    });

    CleanupTask { handle }
}
