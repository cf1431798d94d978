mod config;
pub mod database;
mod records;
mod store;

pub use config::{Config, DefaultsConfig, HistoryConfig, TrackerConfig, TrackerSettings};
pub use database::Database;
pub use records::{Records, DOMAIN_TIMERS_KEY, TIME_TRACKING_KEY};
pub use store::{KeyValueStore, MemoryStore};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/sitebudget[-dev]/` based on SITEBUDGET_ENV.
///
/// Set SITEBUDGET_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("SITEBUDGET_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("sitebudget-dev")
    } else {
        base_dir.join("sitebudget")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(e.to_string()))?;
    Ok(dir)
}
