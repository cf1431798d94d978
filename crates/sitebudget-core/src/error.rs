//! Core error types for sitebudget-core.
//!
//! Storage failures inside the tracker are logged and skipped rather than
//! propagated; these types surface from the configuration-layer operations
//! and from the CLI.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for sitebudget-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Key-value store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Rejected user input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by a [`KeyValueStore`](crate::storage::KeyValueStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backing store could not be reached this cycle.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// SQLite rejected a statement.
    #[error("sqlite: {0}")]
    Sqlite(String),

    /// A top-level record exists but is not valid JSON.
    #[error("record '{key}' is corrupt: {message}")]
    Corrupt { key: String, message: String },
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

    /// Key does not exist in the configuration tree
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Home/config directory could not be prepared
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors for domain input and timer settings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a URL or domain name")]
    EmptyInput,

    #[error("URLs cannot contain spaces. Please check your input.")]
    ContainsSpaces,

    #[error("Invalid URL format. Try: example.com or https://example.com")]
    InvalidUrl,

    #[error("IP addresses are not supported. Please use domain names.")]
    IpAddress,

    #[error("Local domains cannot be tracked.")]
    LocalDomain,

    #[error("Invalid domain format.")]
    InvalidFormat,

    #[error("{0} is already being tracked")]
    AlreadyTracked(String),

    #[error("{0} is not being tracked")]
    NotTracked(String),

    /// Budget must be a positive number of seconds.
    #[error("Invalid time budget: {0} seconds")]
    InvalidBudget(i64),

    /// Reset interval must be at least one hour.
    #[error("Invalid reset interval: {0} hours")]
    InvalidInterval(u32),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg)
                if inner.code == rusqlite::ErrorCode::DatabaseBusy
                    || inner.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                StorageError::Unavailable(err.to_string())
            }
            _ => StorageError::Sqlite(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
