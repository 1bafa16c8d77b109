//! SQLite backend over `sqlx`.
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use login_attempts_common::Attempt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

use super::{AttemptBackend, AttemptFilter};
use crate::error::StoreError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS attempts (
    id            TEXT PRIMARY KEY,
    address       TEXT NOT NULL,
    action        TEXT NOT NULL,
    expires_at    INTEGER NOT NULL,
    expires_nanos INTEGER NOT NULL,
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_attempts_address_action ON attempts(address, action);
CREATE INDEX IF NOT EXISTS idx_attempts_expires_at ON attempts(expires_at, expires_nanos);
"#;

/// Relational backend storing attempts in an `attempts` table.
///
/// Expiry is stored as Unix seconds plus the sub-second nanoseconds and
/// compared as a pair, so ordering holds for the whole `chrono` range.
/// `created_at` is informational RFC 3339 text.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open or create the database at `url` (e.g. `sqlite://attempts.db`).
    ///
    /// The pool is small because SQLite has a single writer, and fails
    /// fast when it cannot hand out a connection. In-memory URLs in any
    /// spelling get the single-connection pool of [`in_memory`](Self::in_memory).
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?;
        if is_in_memory(url) {
            return Self::single_connection(options).await;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(options.create_if_missing(true))
            .await?;
        Self::with_pool(pool).await
    }

    /// Private in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::single_connection(SqliteConnectOptions::from_str("sqlite::memory:")?).await
    }

    /// The pool holds exactly one connection that is never recycled, since
    /// an in-memory database lives only as long as its connection.
    async fn single_connection(options: SqliteConnectOptions) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    /// Use an existing pool, creating the table if it does not exist.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        tracing::debug!("attempts schema ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Whether `url` names an in-memory database, read the way
/// `SqliteConnectOptions` reads it: a `:memory:` database or `mode=memory`.
fn is_in_memory(url: &str) -> bool {
    let url = url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
    let (database, params) = url.split_once('?').unwrap_or((url, ""));
    database == ":memory:"
        || params
            .split('&')
            .any(|pair| pair.eq_ignore_ascii_case("mode=memory"))
}

/// Unix seconds and sub-second nanoseconds of `ts`
fn expiry_key(ts: DateTime<Utc>) -> (i64, i64) {
    (ts.timestamp(), i64::from(ts.timestamp_subsec_nanos()))
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &AttemptFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(address) = &filter.address {
        qb.push(" AND address = ").push_bind(address.clone());
    }
    if let Some(action) = &filter.action {
        qb.push(" AND action = ").push_bind(action.clone());
    }
    if let Some(now) = filter.live_at {
        push_expiry_bound(qb, ">=", now);
    }
    if let Some(now) = filter.expired_at {
        push_expiry_bound(qb, "<", now);
    }
}

fn push_expiry_bound(qb: &mut QueryBuilder<'_, Sqlite>, op: &str, now: DateTime<Utc>) {
    let (secs, nanos) = expiry_key(now);
    qb.push(" AND (expires_at, expires_nanos) ")
        .push(op)
        .push(" (")
        .push_bind(secs)
        .push(", ")
        .push_bind(nanos)
        .push(")");
}

#[async_trait]
impl AttemptBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn insert(&self, attempt: &Attempt) -> Result<(), StoreError> {
        let (expires_at, expires_nanos) = expiry_key(attempt.expires_at());
        sqlx::query(
            "INSERT INTO attempts (id, address, action, expires_at, expires_nanos, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(attempt.id().to_string())
        .bind(attempt.address())
        .bind(attempt.action())
        .bind(expires_at)
        .bind(expires_nanos)
        .bind(attempt.created_at().to_rfc3339_opts(SecondsFormat::Nanos, true))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count(&self, filter: &AttemptFilter) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM attempts");
        push_filter(&mut qb, filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        u64::try_from(count).map_err(|_| StoreError::Corrupt(format!("negative count {count}")))
    }

    async fn delete(&self, filter: &AttemptFilter) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM attempts");
        push_filter(&mut qb, filter);
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
