//! TOML-based application configuration.
//!
//! Stores:
//! - Idle detection (idle threshold, reaper interval). The countdown tick
//!   is fixed at one second and is not configurable.
//! - Usage history retention
//! - Defaults for newly added domains and the first-run domain list
//!
//! Configuration is stored at `~/.config/sitebudget/config.toml`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Idle-detection cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_idle_threshold_secs")]
    pub idle_threshold_secs: u64,
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,
}

/// Usage history retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

/// Defaults applied when domains are added without explicit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_reset_interval_hours")]
    pub reset_interval_hours: u32,
    #[serde(default = "default_time_allowed_minutes")]
    pub time_allowed_minutes: u32,
    /// Seeded on first run, when no timers have ever been stored.
    #[serde(default = "default_domains")]
    pub domains: Vec<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/sitebudget/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Idle-detection cadence as durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    pub idle_threshold: Duration,
    pub reaper_interval: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        TrackerConfig::default().settings()
    }
}

fn default_idle_threshold_secs() -> u64 {
    120
}
fn default_reaper_interval_secs() -> u64 {
    30
}
fn default_retention_days() -> u32 {
    30
}
fn default_reset_interval_hours() -> u32 {
    24
}
fn default_time_allowed_minutes() -> u32 {
    1
}
fn default_domains() -> Vec<String> {
    [
        "www.reddit.com",
        "old.reddit.com",
        "twitter.com",
        "x.com",
        "instagram.com",
        "www.instagram.com",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            idle_threshold_secs: default_idle_threshold_secs(),
            reaper_interval_secs: default_reaper_interval_secs(),
        }
    }
}

impl TrackerConfig {
    /// Zero values fall back to one second so intervals never spin.
    pub fn settings(&self) -> TrackerSettings {
        TrackerSettings {
            idle_threshold: Duration::from_secs(self.idle_threshold_secs.max(1)),
            reaper_interval: Duration::from_secs(self.reaper_interval_secs.max(1)),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            reset_interval_hours: default_reset_interval_hours(),
            time_allowed_minutes: default_time_allowed_minutes(),
            domains: default_domains(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => {
                    let n = value
                        .parse::<u64>()
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                    serde_json::Value::Number(n.into())
                }
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    /// Load from disk, writing defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load_from(path: &PathBuf) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.clone(),
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    pub fn save_to(&self, path: &PathBuf) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.clone(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without persisting.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    pub fn tracker_settings(&self) -> TrackerSettings {
        self.tracker.settings()
    }

    /// Default budget for new domains, in seconds.
    pub fn default_original_time(&self) -> i64 {
        i64::from(self.defaults.time_allowed_minutes) * 60
    }
}
