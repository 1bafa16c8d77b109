// crates/attempts-lib/src/error.rs

//! Central error types for the attempt store.
use thiserror::Error;

pub use crate::validation::ValidationError;

/// Result alias used by every store operation
pub type Result<T> = std::result::Result<T, AttemptError>;

/// Failures of the backing store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt attempt record: {0}")]
    Corrupt(String),
}

/// Error returned by the attempt store.
///
/// Input problems and storage problems are kept apart so a caller can
/// reject bad input without treating it as an infrastructure failure.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl AttemptError {
    pub fn is_validation(&self) -> bool {
        matches!(self, AttemptError::Validation(_))
    }

    pub fn is_store(&self) -> bool {
        matches!(self, AttemptError::Store(_))
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AttemptError::Validation(ValidationError::InvalidAddress(_)) => "VAL_001",
            AttemptError::Validation(ValidationError::EmptyAction) => "VAL_002",
            AttemptError::Validation(ValidationError::InvalidAction(_)) => "VAL_003",
            AttemptError::Validation(ValidationError::InvalidDuration(_)) => "VAL_004",
            AttemptError::Store(StoreError::Unavailable(_)) => "STORE_001",
            AttemptError::Store(StoreError::Io(_)) => "STORE_002",
            AttemptError::Store(StoreError::Json(_)) => "STORE_003",
            AttemptError::Store(StoreError::Database(_)) => "STORE_004",
            AttemptError::Store(StoreError::Corrupt(_)) => "STORE_005",
        }
    }

    /// Get a sanitized message suitable for end users
    pub fn sanitized_message(&self) -> String {
        match self {
            AttemptError::Validation(ValidationError::InvalidAddress(_)) => {
                "Invalid client address".to_string()
            },
            AttemptError::Validation(_) => "Invalid input provided".to_string(),
            AttemptError::Store(_) => "Login throttling is temporarily unavailable".to_string(),
        }
    }
}
