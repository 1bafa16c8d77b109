// ============================
// crates/attempts-lib/src/config.rs
// ============================
//! Configuration management.
use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{FailurePolicy, LoginThrottle, DEFAULT_LOCKOUT_DURATION, DEFAULT_MAX_ATTEMPTS};
use crate::cleanup::{spawn_cleanup_task, CleanupMode, CleanupTask};
use crate::storage::{AttemptBackend, FlatFileBackend, MemoryBackend, SqliteBackend};
use crate::store::AttemptStore;

/// Default configuration file, looked up in the working directory
pub const CONFIG_FILE: &str = "login-attempts.toml";

/// Prefix of environment overrides, `__` separates nested keys
pub const ENV_PREFIX: &str = "LOGIN_ATTEMPTS_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Log level
    pub log_level: String,
    /// Where attempts are stored
    pub backend: BackendSettings,
    /// Failures tolerated before a check denies
    pub default_limit: u64,
    /// How long a recorded failure counts, in seconds
    pub default_duration_secs: u64,
    /// When expired attempts are purged
    pub cleanup: CleanupMode,
    /// Answer of a throttle check when the store is down
    pub failure_policy: FailurePolicy,
}

/// Storage backend selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendSettings {
    Memory,
    FlatFile { data_dir: PathBuf },
    Sqlite { url: String },
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            backend: BackendSettings::default(),
            default_limit: DEFAULT_MAX_ATTEMPTS,
            default_duration_secs: DEFAULT_LOCKOUT_DURATION.as_secs(),
            cleanup: CleanupMode::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        BackendSettings::FlatFile {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl Settings {
    /// Load from defaults, `login-attempts.toml` and the environment
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment(Toml::file(CONFIG_FILE)))
    }

    /// Load using an explicit configuration file instead of the default one
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            bail!("configuration file {} does not exist", path.display());
        }
        Self::from_figment(Self::figment(Toml::file(path)))
    }

    fn figment(file: figment::providers::Data<Toml>) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Settings = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            bail!(
                "invalid log level {:?}, expected one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            );
        }
        if self.default_limit == 0 {
            bail!("default_limit must be at least 1");
        }
        if self.default_duration_secs == 0 {
            bail!("default_duration_secs must be at least 1");
        }
        if let CleanupMode::Periodic { interval_secs: 0 } = self.cleanup {
            bail!("periodic cleanup needs a non-zero interval_secs");
        }
        match &self.backend {
            BackendSettings::Sqlite { url } if url.trim().is_empty() => {
                bail!("sqlite backend needs a url");
            },
            BackendSettings::FlatFile { data_dir } if data_dir.as_os_str().is_empty() => {
                bail!("flat_file backend needs a data_dir");
            },
            _ => {},
        }
        Ok(())
    }

    pub fn default_duration(&self) -> Duration {
        Duration::from_secs(self.default_duration_secs)
    }

    /// Open the configured backend and wrap it in a store
    pub async fn open_store(&self) -> crate::error::Result<AttemptStore> {
        let backend: Arc<dyn AttemptBackend> = match &self.backend {
            BackendSettings::Memory => Arc::new(MemoryBackend::new()),
            BackendSettings::FlatFile { data_dir } => Arc::new(FlatFileBackend::new(data_dir)?),
            BackendSettings::Sqlite { url } => Arc::new(SqliteBackend::connect(url).await?),
        };
        tracing::debug!(backend = backend.name(), cleanup = ?self.cleanup, "opened attempt store");
        Ok(AttemptStore::new(backend).with_cleanup_mode(self.cleanup))
    }

    /// Start the background cleanup task when the mode is periodic.
    ///
    /// Keep the returned handle alive for as long as cleanup should run.
    /// Must be called from within a tokio runtime.
    pub fn start_cleanup(&self, store: &AttemptStore) -> Option<CleanupTask> {
        let period = self.cleanup.interval().filter(|period| !period.is_zero())?;
        tracing::info!(backend = store.backend_name(), ?period, "starting periodic attempt cleanup");
        Some(spawn_cleanup_task(store.clone(), period))
    }

    /// Throttle for `action` using the configured limit, duration and policy
    pub fn throttle(&self, store: AttemptStore, action: impl Into<String>) -> LoginThrottle {
        LoginThrottle::new(store, action)
            .with_max_attempts(self.default_limit)
            .with_lockout_duration(self.default_duration())
            .with_failure_policy(self.failure_policy)
    }
}
