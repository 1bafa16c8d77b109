//! Shared setup: one store per backend, all on a manual clock.

use chrono::{TimeZone, Utc};
use login_attempts::storage::{FlatFileBackend, MemoryBackend, SqliteBackend};
use login_attempts::{AttemptStore, ManualClock};
use std::sync::Arc;
use tempfile::TempDir;

pub struct Fixture {
    pub backend: &'static str,
    pub store: AttemptStore,
    pub clock: ManualClock,
    // keep in scope so the flat-file directory outlives the test
    _temp_dir: Option<TempDir>,
}

pub async fn fixtures() -> Vec<Fixture> {
    let clock = || ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());

    let memory_clock = clock();
    let memory = AttemptStore::new(Arc::new(MemoryBackend::new()))
        .with_clock(Arc::new(memory_clock.clone()));

    let temp_dir = TempDir::new().unwrap();
    let file_clock = clock();
    let flat_file = AttemptStore::new(Arc::new(FlatFileBackend::new(temp_dir.path()).unwrap()))
        .with_clock(Arc::new(file_clock.clone()));

    let sqlite_clock = clock();
    let sqlite = AttemptStore::new(Arc::new(SqliteBackend::in_memory().await.unwrap()))
        .with_clock(Arc::new(sqlite_clock.clone()));

    vec![
        Fixture {
            backend: "memory",
            store: memory,
            clock: memory_clock,
            _temp_dir: None,
        },
        Fixture {
            backend: "flat_file",
            store: flat_file,
            clock: file_clock,
            _temp_dir: Some(temp_dir),
        },
        Fixture {
            backend: "sqlite",
            store: sqlite,
            clock: sqlite_clock,
            _temp_dir: None,
        },
    ]
}
