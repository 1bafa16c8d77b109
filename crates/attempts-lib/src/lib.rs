// ============================
// crates/attempts-lib/src/lib.rs
// ============================
//! Login-attempt throttling.
//!
//! [`AttemptStore`] records failed logins per client address and action,
//! answers whether a caller is still under a failure limit, forgets an
//! address after a successful login and purges expired records. Storage
//! is pluggable through [`storage::AttemptBackend`] and time through
//! [`clock::Clock`].
//!
//! ```no_run
//! # async fn demo() -> login_attempts::Result<()> {
//! use std::{sync::Arc, time::Duration};
//! use login_attempts::{storage::MemoryBackend, AttemptStore};
//!
//! let store = AttemptStore::new(Arc::new(MemoryBackend::new()));
//! if store.is_under_limit("203.0.113.5", "login", 5).await? {
//!     // verify credentials, then on failure:
//!     store.record_failure("203.0.113.5", "login", Duration::from_secs(300)).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cleanup;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod storage;
pub mod store;
pub mod validation;

pub use auth::{FailurePolicy, LoginThrottle};
pub use cleanup::{spawn_cleanup_task, CleanupMode, CleanupTask};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Settings;
pub use error::{AttemptError, Result, StoreError, ValidationError};
pub use login_attempts_common::{Attempt, AttemptId};
pub use store::AttemptStore;
