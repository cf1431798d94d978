//! Typed access to the `domainTimers` and `timeTracking` records.
//!
//! Each record is one JSON object in the key-value store. Every update
//! re-reads the store, applies a closure, and writes the result back while
//! holding an async mutex, so writers sharing one `Records` never clobber
//! each other with stale copies.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Days;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::warn;

use super::store::KeyValueStore;
use crate::budget::DomainTimerMap;
use crate::clock::date_of;
use crate::error::StorageError;
use crate::tracking::TimeTrackingMap;

pub const DOMAIN_TIMERS_KEY: &str = "domainTimers";
pub const TIME_TRACKING_KEY: &str = "timeTracking";

#[derive(Clone)]
pub struct Records {
    store: Arc<dyn KeyValueStore>,
    write_lock: Arc<Mutex<()>>,
}

impl Records {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Whether the `domainTimers` key has ever been written.
    pub async fn has_domain_timers(&self) -> Result<bool, StorageError> {
        Ok(self.store.get(DOMAIN_TIMERS_KEY).await?.is_some())
    }

    pub async fn domain_timers(&self) -> Result<DomainTimerMap, StorageError> {
        self.load_map(DOMAIN_TIMERS_KEY).await
    }

    pub async fn time_tracking(&self) -> Result<TimeTrackingMap, StorageError> {
        self.load_map(TIME_TRACKING_KEY).await
    }

    pub async fn save_domain_timers(&self, timers: &DomainTimerMap) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.write(DOMAIN_TIMERS_KEY, timers).await
    }

    /// Fresh read-modify-write of the timer map.
    pub async fn update_domain_timers<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut DomainTimerMap) -> T,
    {
        self.update(DOMAIN_TIMERS_KEY, f).await
    }

    /// Fresh read-modify-write of the tracking map.
    pub async fn update_time_tracking<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut TimeTrackingMap) -> T,
    {
        self.update(TIME_TRACKING_KEY, f).await
    }

    /// Close every open session at `now`. Sessions idle for at least
    /// `idle_threshold_ms` end at their last activity instead. Returns
    /// `(domain, seconds)` for each session folded.
    pub async fn close_all_sessions(
        &self,
        now: i64,
        idle_threshold_ms: i64,
    ) -> Result<Vec<(String, i64)>, StorageError> {
        self.update_time_tracking(|tracking| {
            tracking
                .iter_mut()
                .filter_map(|(domain, record)| {
                    record
                        .close_if_idle(now, idle_threshold_ms)
                        .or_else(|| record.close_session(now))
                        .map(|secs| (domain.clone(), secs))
                })
                .collect()
        })
        .await
    }

    /// Drop daily totals older than `retention_days`.
    pub async fn prune_history(&self, now: i64, retention_days: u32) -> Result<usize, StorageError> {
        let Some(cutoff) = date_of(now).checked_sub_days(Days::new(u64::from(retention_days)))
        else {
            return Ok(0);
        };
        self.update_time_tracking(|tracking| {
            tracking
                .values_mut()
                .map(|record| record.prune_before(cutoff))
                .sum()
        })
        .await
    }

    /// Load a map record. Absent -> empty. Entries that do not match the
    /// expected shape are dropped and treated as untracked.
    async fn load_map<V>(&self, key: &str) -> Result<BTreeMap<String, V>, StorageError>
    where
        V: DeserializeOwned,
    {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(BTreeMap::new());
        };

        let entries: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        let mut out = BTreeMap::new();
        for (name, value) in entries {
            match serde_json::from_value::<V>(value) {
                Ok(parsed) => {
                    out.insert(name, parsed);
                }
                Err(e) => warn!(record = key, entry = %name, error = %e, "dropping malformed entry"),
            }
        }
        Ok(out)
    }

    /// Unchanged maps are not written back.
    async fn update<V, F, T>(&self, key: &str, f: F) -> Result<T, StorageError>
    where
        V: DeserializeOwned + Serialize + Clone + PartialEq,
        F: FnOnce(&mut BTreeMap<String, V>) -> T,
    {
        let _guard = self.write_lock.lock().await;
        let mut map: BTreeMap<String, V> = self.load_map(key).await?;
        let before = map.clone();
        let out = f(&mut map);
        if map != before {
            self.write(key, &map).await?;
        }
        Ok(out)
    }

    async fn write<V: Serialize>(&self, key: &str, value: &V) -> Result<(), StorageError> {
        let json = serde_json::to_string(value).map_err(|e| StorageError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.store.set(vec![(key.to_string(), json)]).await
    }
}
