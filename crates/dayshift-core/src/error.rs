//! Core error types for dayshift-core.
//!
//! Every failure class the session core can hit is recovered locally; these
//! types exist so the recovering call site can log precisely what degraded.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for dayshift-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistence-related errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Key-value store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors for caller-supplied values.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    /// Session duration must be strictly positive
    #[error("Session duration must be positive, got {0} ms")]
    NonPositiveDuration(i64),

    /// Session duration above the one-week ceiling
    #[error("Session duration must be at most {max_ms} ms, got {ms} ms")]
    DurationTooLong { ms: i64, max_ms: u64 },

    /// Duration given in hours was not a finite positive number
    #[error("Invalid duration: {0} hours")]
    InvalidHours(f64),

    /// Activity kind name not recognised
    #[error("Unknown activity kind: {0}")]
    UnknownActivity(String),
}

/// Wake-lock capability errors.
#[derive(Error, Debug)]
pub enum WakeLockError {
    /// Platform has no wake-lock mechanism, or it is disabled
    #[error("Wake lock unavailable: {0}")]
    Unavailable(String),

    /// Acquisition was attempted and failed
    #[error("Wake lock acquisition failed: {0}")]
    AcquireFailed(String),
}

/// Notification capability errors.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Delivering the notification failed
    #[error("Failed to show notification: {0}")]
    ShowFailed(String),
}

/// Tip lookup errors. Never surfaced past the tip provider.
#[derive(Error, Debug)]
pub enum TipError {
    #[error("No tip service credential configured")]
    MissingCredential,

    #[error("Tip request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Tip service returned HTTP {0}")]
    Status(u16),

    #[error("Malformed tip response: {0}")]
    Malformed(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseBusy
                    || inner.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
