//! Configuration-layer operations on tracked domains.
//!
//! Every edit goes through [`Records`] read-modify-write helpers, so it is
//! serialized against countdown ticks running in the same process. Budget
//! edits are reconciled with [`DomainTimer::reconcile_settings_change`];
//! when that restarts the cycle, an attached tracker is told to restart
//! so a countdown started before the edit does not keep running.

use serde::Serialize;
use tracing::{debug, info};

use crate::budget::{DomainTimer, DomainTimerMap, Reconciliation};
use crate::domain::{base_domain, normalize_domain, parse_domain_input};
use crate::error::{Result, ValidationError};
use crate::storage::{Config, Records};
use crate::tracker::ActiveContextTracker;
use crate::tracking::{Period, TimeTrackingRecord};

/// Reset interval assumed when no timer exists yet.
pub const DEFAULT_RESET_INTERVAL_HOURS: u32 = 24;

/// One row of the domain listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainOverview {
    pub domain: String,
    pub timer: DomainTimer,
    pub last_24h: i64,
    pub last_7d: i64,
    pub last_30d: i64,
    pub all_time: i64,
}

#[derive(Clone)]
pub struct DomainRegistry {
    records: Records,
    tracker: Option<ActiveContextTracker>,
}

impl DomainRegistry {
    pub fn new(records: Records) -> Self {
        Self {
            records,
            tracker: None,
        }
    }

    /// Restart this tracker whenever an edit replenishes a budget.
    ///
    /// Only a tracker attached here is notified. A registry without one,
    /// such as the one behind `sitebudget domain set`, cannot reach a
    /// tracker running in another process; that tracker keeps its countdown
    /// and picks the new budget up on its next tick, because every tick
    /// re-reads the stored timer.
    pub fn with_tracker(mut self, tracker: ActiveContextTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn records(&self) -> &Records {
        &self.records
    }

    /// Write the default domain list, but only on first run.
    ///
    /// Returns whether anything was written.
    pub async fn seed_defaults(&self, config: &Config, now: i64) -> Result<bool> {
        if self.records.has_domain_timers().await? {
            return Ok(false);
        }

        let original_time = config.default_original_time();
        let interval = config.defaults.reset_interval_hours;
        DomainTimer::validate_settings(original_time, interval)?;

        let seeded: DomainTimerMap = config
            .defaults
            .domains
            .iter()
            .map(|d| normalize_domain(d))
            .filter(|d| !d.is_empty())
            .map(|d| (d, DomainTimer::new(original_time, interval, now)))
            .collect();
        self.records.save_domain_timers(&seeded).await?;
        info!(count = seeded.len(), "seeded default domains");
        Ok(true)
    }

    /// Parse `input`, then start tracking it with a fresh budget.
    pub async fn add_domain(
        &self,
        input: &str,
        minutes: i64,
        reset_interval_hours: u32,
        now: i64,
    ) -> Result<String> {
        let domain = parse_domain_input(input)?;
        let original_time = minutes.saturating_mul(60);
        DomainTimer::validate_settings(original_time, reset_interval_hours)?;

        self.records
            .update_domain_timers(|timers| {
                if timers.contains_key(&domain) {
                    return Err(ValidationError::AlreadyTracked(domain.clone()));
                }
                timers.insert(
                    domain.clone(),
                    DomainTimer::new(original_time, reset_interval_hours, now),
                );
                Ok(())
            })
            .await??;

        info!(domain = %domain, original_time, reset_interval_hours, "domain added");
        Ok(domain)
    }

    /// Apply an edited budget and interval to one domain.
    pub async fn update_settings(
        &self,
        domain: &str,
        original_time: i64,
        reset_interval_hours: u32,
        now: i64,
    ) -> Result<Reconciliation> {
        DomainTimer::validate_settings(original_time, reset_interval_hours)?;
        let domain = normalize_domain(domain);

        let reconciled = self
            .records
            .update_domain_timers(|timers| {
                let timer = timers
                    .get_mut(&domain)
                    .ok_or_else(|| ValidationError::NotTracked(domain.clone()))?;
                let outcome = timer.reconcile_settings_change(original_time, reset_interval_hours, now);
                *timer = outcome.timer.clone();
                Ok::<_, ValidationError>(outcome)
            })
            .await??;

        info!(
            domain = %domain,
            original_time,
            reset_interval_hours,
            was_reset = reconciled.was_reset,
            "settings updated"
        );
        if reconciled.was_reset {
            self.restart_tracker().await;
        }
        Ok(reconciled)
    }

    /// Stop tracking `domain`. Usage history is kept.
    pub async fn remove_domain(&self, domain: &str) -> Result<DomainTimer> {
        let domain = normalize_domain(domain);
        let removed = self
            .records
            .update_domain_timers(|timers| timers.remove(&domain))
            .await?
            .ok_or_else(|| ValidationError::NotTracked(domain.clone()))?;
        info!(domain = %domain, "domain removed");
        Ok(removed)
    }

    /// Replenish every budget now.
    pub async fn reset_all_timers(&self, now: i64) -> Result<usize> {
        let count = self
            .records
            .update_domain_timers(|timers| {
                for timer in timers.values_mut() {
                    *timer = timer.replenished(now);
                }
                timers.len()
            })
            .await?;
        info!(count, "all timers reset");
        if count > 0 {
            self.restart_tracker().await;
        }
        Ok(count)
    }

    /// Apply one reset interval to every domain. Remaining budgets are kept.
    pub async fn set_global_reset_interval(&self, hours: u32) -> Result<usize> {
        if hours == 0 {
            return Err(ValidationError::InvalidInterval(hours).into());
        }
        let count = self
            .records
            .update_domain_timers(|timers| {
                for timer in timers.values_mut() {
                    timer.reset_interval = hours;
                }
                timers.len()
            })
            .await?;
        info!(hours, count, "global reset interval applied");
        Ok(count)
    }

    /// Interval of the first tracked domain, or the default.
    pub async fn global_reset_interval(&self) -> Result<u32> {
        let timers = self.records.domain_timers().await?;
        Ok(timers
            .values()
            .next()
            .map(|t| t.reset_interval)
            .unwrap_or(DEFAULT_RESET_INTERVAL_HOURS))
    }

    /// Wipe usage history for one domain. Returns false when there was none.
    pub async fn reset_statistics(&self, domain: &str, now: i64) -> Result<bool> {
        let domain = normalize_domain(domain);
        let reset = self
            .records
            .update_time_tracking(|tracking| match tracking.get_mut(&domain) {
                Some(record) => {
                    record.reset_statistics(now);
                    true
                }
                None => false,
            })
            .await?;
        debug!(domain = %domain, reset, "statistics reset");
        Ok(reset)
    }

    /// Wipe usage history for every domain.
    pub async fn reset_all_statistics(&self, now: i64) -> Result<usize> {
        let count = self
            .records
            .update_time_tracking(|tracking| {
                for record in tracking.values_mut() {
                    record.reset_statistics(now);
                }
                tracking.len()
            })
            .await?;
        info!(count, "all statistics reset");
        Ok(count)
    }

    /// Every tracked domain with its usage, grouped by base domain.
    pub async fn overview(&self, now: i64) -> Result<Vec<DomainOverview>> {
        let timers = self.records.domain_timers().await?;
        let tracking = self.records.time_tracking().await?;

        let mut rows: Vec<DomainOverview> = timers
            .into_iter()
            .map(|(domain, timer)| {
                let usage = tracking.get(&domain);
                let spent = |period| usage.map_or(0, |r: &TimeTrackingRecord| r.time_spent(period, now));
                DomainOverview {
                    last_24h: spent(Period::Last24h),
                    last_7d: spent(Period::Last7d),
                    last_30d: spent(Period::Last30d),
                    all_time: spent(Period::AllTime),
                    domain,
                    timer,
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            base_domain(&a.domain)
                .cmp(base_domain(&b.domain))
                .then_with(|| a.domain.cmp(&b.domain))
        });
        Ok(rows)
    }

    async fn restart_tracker(&self) {
        if let Some(tracker) = &self.tracker {
            let outcome = tracker.restart().await;
            debug!(?outcome, "tracker restarted after budget change");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::CoreError;
    use crate::storage::MemoryStore;

    const NOW: i64 = 1_710_072_000_000;

    fn registry() -> DomainRegistry {
        DomainRegistry::new(Records::new(Arc::new(MemoryStore::new())))
    }

    #[tokio::test]
    async fn seeds_defaults_only_once() {
        let registry = registry();
        let config = Config::default();

        assert!(registry.seed_defaults(&config, NOW).await.unwrap());
        let timers = registry.records().domain_timers().await.unwrap();
        assert_eq!(timers.len(), 6);
        assert_eq!(timers["x.com"].original_time, 60);
        assert_eq!(timers["x.com"].reset_interval, 24);

        registry.remove_domain("x.com").await.unwrap();
        assert!(!registry.seed_defaults(&config, NOW).await.unwrap());
        assert_eq!(registry.records().domain_timers().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn add_domain_parses_and_rejects_duplicates() {
        let registry = registry();
        let domain = registry
            .add_domain("https://News.Example.com/path?q=1", 5, 12, NOW)
            .await
            .unwrap();
        assert_eq!(domain, "news.example.com");

        let timer = &registry.records().domain_timers().await.unwrap()[&domain];
        assert_eq!(timer.original_time, 300);
        assert_eq!(timer.time_left, 300);

        let err = registry
            .add_domain("news.example.com", 5, 12, NOW)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::AlreadyTracked(_))
        ));
    }

    #[tokio::test]
    async fn add_domain_rejects_bad_settings() {
        let registry = registry();
        assert!(matches!(
            registry.add_domain("a.com", 0, 24, NOW).await,
            Err(CoreError::Validation(ValidationError::InvalidBudget(0)))
        ));
        assert!(matches!(
            registry.add_domain("a.com", 5, 0, NOW).await,
            Err(CoreError::Validation(ValidationError::InvalidInterval(0)))
        ));
        assert!(matches!(
            registry.add_domain("127.0.0.1", 5, 24, NOW).await,
            Err(CoreError::Validation(ValidationError::IpAddress))
        ));
    }

    #[tokio::test]
    async fn update_settings_reconciles() {
        let registry = registry();
        registry.add_domain("a.com", 10, 24, NOW).await.unwrap();

        let same = registry
            .update_settings("a.com", 600, 48, NOW + 1)
            .await
            .unwrap();
        assert!(!same.was_reset);
        assert_eq!(same.timer.reset_interval, 48);
        assert_eq!(same.timer.last_reset_timestamp, NOW);

        let shrunk = registry
            .update_settings("a.com", 300, 48, NOW + 2)
            .await
            .unwrap();
        assert!(shrunk.was_reset);
        assert_eq!(shrunk.timer.time_left, 300);
        assert_eq!(shrunk.timer.last_reset_timestamp, NOW + 2);

        let missing = registry.update_settings("b.com", 300, 24, NOW).await;
        assert!(matches!(
            missing,
            Err(CoreError::Validation(ValidationError::NotTracked(_)))
        ));
    }

    #[tokio::test]
    async fn remove_keeps_history() {
        let registry = registry();
        registry.add_domain("a.com", 1, 24, NOW).await.unwrap();
        registry
            .records()
            .update_time_tracking(|t| {
                t.insert("a.com".into(), TimeTrackingRecord::new(NOW));
            })
            .await
            .unwrap();

        registry.remove_domain("A.com").await.unwrap();
        assert!(registry.records().domain_timers().await.unwrap().is_empty());
        assert!(registry
            .records()
            .time_tracking()
            .await
            .unwrap()
            .contains_key("a.com"));

        assert!(registry.remove_domain("a.com").await.is_err());
    }

    #[tokio::test]
    async fn reset_all_timers_replenishes() {
        let registry = registry();
        registry.add_domain("a.com", 1, 24, NOW).await.unwrap();
        registry
            .records()
            .update_domain_timers(|timers| {
                let timer = timers.get_mut("a.com").unwrap();
                timer.time_left = 0;
                timer.expired_message_logged = true;
            })
            .await
            .unwrap();

        assert_eq!(registry.reset_all_timers(NOW + 5).await.unwrap(), 1);
        let timer = &registry.records().domain_timers().await.unwrap()["a.com"];
        assert_eq!(timer.time_left, 60);
        assert!(!timer.expired_message_logged);
        assert_eq!(timer.last_reset_timestamp, NOW + 5);
    }

    #[tokio::test]
    async fn global_interval_applies_to_all() {
        let registry = registry();
        assert_eq!(registry.global_reset_interval().await.unwrap(), 24);
        registry.add_domain("a.com", 1, 24, NOW).await.unwrap();
        registry.add_domain("b.com", 1, 12, NOW).await.unwrap();

        assert_eq!(registry.set_global_reset_interval(6).await.unwrap(), 2);
        assert_eq!(registry.global_reset_interval().await.unwrap(), 6);
        assert!(registry.set_global_reset_interval(0).await.is_err());
    }

    #[tokio::test]
    async fn overview_sorts_by_base_domain() {
        let registry = registry();
        for input in ["www.zeta.com", "b.alpha.org", "a.alpha.org", "alpha.net"] {
            registry.add_domain(input, 1, 24, NOW).await.unwrap();
        }
        let rows = registry.overview(NOW).await.unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(names, ["alpha.net", "a.alpha.org", "b.alpha.org", "www.zeta.com"]);
    }

    #[tokio::test]
    async fn statistics_reset_per_domain_and_all() {
        let registry = registry();
        registry
            .records()
            .update_time_tracking(|t| {
                let mut rec = TimeTrackingRecord::new(NOW);
                rec.all_time_total = 50;
                t.insert("a.com".into(), rec.clone());
                t.insert("b.com".into(), rec);
            })
            .await
            .unwrap();

        assert!(registry.reset_statistics("a.com", NOW).await.unwrap());
        assert!(!registry.reset_statistics("c.com", NOW).await.unwrap());
        let tracking = registry.records().time_tracking().await.unwrap();
        assert_eq!(tracking["a.com"].all_time_total, 0);
        assert_eq!(tracking["b.com"].all_time_total, 50);

        assert_eq!(registry.reset_all_statistics(NOW).await.unwrap(), 2);
        let tracking = registry.records().time_tracking().await.unwrap();
        assert_eq!(tracking["b.com"].all_time_total, 0);
    }
}
