// ============================
// crates/attempts-lib/src/auth/mod.rs
// ============================
//! Authentication-flow helpers built on the attempt store.

pub mod rate_limit;

pub use rate_limit::{FailurePolicy, LoginThrottle, DEFAULT_LOCKOUT_DURATION, DEFAULT_MAX_ATTEMPTS};
