// ==============
// crates/attempts-lib/src/metrics.rs

//! Central place for metric keys
pub const ATTEMPT_RECORDED: &str = "login_attempts.recorded";
pub const CHECK_DENIED: &str = "login_attempts.denied";
pub const ATTEMPTS_RESET: &str = "login_attempts.reset";
pub const ATTEMPTS_CLEANED: &str = "login_attempts.cleaned";
pub const STORE_ERRORS: &str = "login_attempts.store_errors";
