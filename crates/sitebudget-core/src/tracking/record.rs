//! Historical usage per domain, independent of the budget timer.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::clock::{date_key, date_of};

/// Rolling window for usage queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "24h")]
    Last24h,
    #[serde(rename = "7d")]
    Last7d,
    #[serde(rename = "30d")]
    Last30d,
    #[serde(rename = "alltime")]
    AllTime,
}

impl Period {
    /// Number of calendar days summed, today included. `None` for all-time.
    pub fn days(self) -> Option<u64> {
        match self {
            Period::Last24h => Some(1),
            Period::Last7d => Some(7),
            Period::Last30d => Some(30),
            Period::AllTime => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Period::Last24h => "24h",
            Period::Last7d => "7d",
            Period::Last30d => "30d",
            Period::AllTime => "alltime",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" => Ok(Period::Last24h),
            "7d" => Ok(Period::Last7d),
            "30d" => Ok(Period::Last30d),
            "alltime" => Ok(Period::AllTime),
            other => Err(format!("unknown period '{other}' (expected 24h, 7d, 30d or alltime)")),
        }
    }
}

/// Usage history for one hostname, persisted under `timeTracking`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeTrackingRecord {
    /// `YYYY-MM-DD` -> seconds spent that day.
    #[serde(default)]
    pub daily_totals: BTreeMap<String, i64>,
    #[serde(default)]
    pub all_time_total: i64,
    pub tracking_start_date: String,
    pub last_reset_date: String,
    /// Non-null exactly while a session is open.
    #[serde(default)]
    pub current_session_start: Option<i64>,
    pub last_active_timestamp: i64,
}

impl TimeTrackingRecord {
    pub fn new(now: i64) -> Self {
        let today = date_key(now);
        Self {
            daily_totals: BTreeMap::new(),
            all_time_total: 0,
            tracking_start_date: today.clone(),
            last_reset_date: today,
            current_session_start: None,
            last_active_timestamp: now,
        }
    }

    pub fn is_session_open(&self) -> bool {
        self.current_session_start.is_some()
    }

    /// Start a session at `now`. An already-open session is folded first.
    pub fn open_session(&mut self, now: i64) {
        if self.is_session_open() {
            self.close_session(now);
        }
        self.current_session_start = Some(now);
        self.last_active_timestamp = now;
    }

    /// Record activity for idle detection.
    pub fn touch(&mut self, now: i64) {
        if self.is_session_open() {
            self.last_active_timestamp = now;
        }
    }

    /// Close the open session ending at `end`, folding whole elapsed
    /// seconds into the day of `end` and the all-time total.
    ///
    /// Returns the seconds folded, or `None` when no session was open.
    pub fn close_session(&mut self, end: i64) -> Option<i64> {
        let start = self.current_session_start.take()?;
        let seconds = end.saturating_sub(start).max(0) / 1000;

        *self.daily_totals.entry(date_key(end)).or_insert(0) += seconds;
        self.all_time_total = self.all_time_total.saturating_add(seconds);
        self.last_active_timestamp = end;
        Some(seconds)
    }

    /// Close the session if no activity was seen for `idle_threshold_ms`.
    /// The idle gap itself is not counted.
    pub fn close_if_idle(&mut self, now: i64, idle_threshold_ms: i64) -> Option<i64> {
        self.current_session_start?;
        if now.saturating_sub(self.last_active_timestamp) < idle_threshold_ms {
            return None;
        }
        let end = self.last_active_timestamp;
        self.close_session(end)
    }

    /// Seconds spent in `period`, including the open session's elapsed time
    /// for rolling windows.
    pub fn time_spent(&self, period: Period, now: i64) -> i64 {
        let Some(days) = period.days() else {
            return self.all_time_total;
        };

        let open = self
            .current_session_start
            .map(|start| now.saturating_sub(start).max(0) / 1000)
            .unwrap_or(0);

        let today = date_of(now);
        let summed: i64 = (0..days)
            .filter_map(|back| today.checked_sub_days(Days::new(back)))
            .filter_map(|day| {
                self.daily_totals
                    .get(&day.format("%Y-%m-%d").to_string())
                    .copied()
            })
            .sum();

        summed + open
    }

    /// Drop daily entries dated before `cutoff`. Returns how many went.
    pub fn prune_before(&mut self, cutoff: NaiveDate) -> usize {
        let cutoff_key = cutoff.format("%Y-%m-%d").to_string();
        let before = self.daily_totals.len();
        self.daily_totals.retain(|day, _| day.as_str() >= cutoff_key.as_str());
        before - self.daily_totals.len()
    }

    /// Wipe history. An open session is discarded, not folded.
    pub fn reset_statistics(&mut self, now: i64) {
        *self = Self::new(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-10T12:00:00Z
    const NOON: i64 = 1_710_072_000_000;
    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    #[test]
    fn session_folds_into_today_and_all_time() {
        let mut rec = TimeTrackingRecord::new(NOON);
        rec.open_session(NOON);
        assert!(rec.is_session_open());

        assert_eq!(rec.close_session(NOON + 90_500), Some(90));
        assert!(!rec.is_session_open());
        assert_eq!(rec.daily_totals.get("2024-03-10"), Some(&90));
        assert_eq!(rec.all_time_total, 90);
    }

    #[test]
    fn closing_without_session_is_noop() {
        let mut rec = TimeTrackingRecord::new(NOON);
        assert_eq!(rec.close_session(NOON + 5_000), None);
        assert_eq!(rec.all_time_total, 0);
    }

    #[test]
    fn reopening_folds_previous_session() {
        let mut rec = TimeTrackingRecord::new(NOON);
        rec.open_session(NOON);
        rec.open_session(NOON + 10_000);
        assert_eq!(rec.all_time_total, 10);
        assert_eq!(rec.current_session_start, Some(NOON + 10_000));
    }

    #[test]
    fn idle_session_closes_at_last_activity() {
        let mut rec = TimeTrackingRecord::new(NOON);
        rec.open_session(NOON);
        rec.touch(NOON + 30_000);

        assert_eq!(rec.close_if_idle(NOON + 60_000, 120_000), None);
        assert_eq!(rec.close_if_idle(NOON + 150_000, 120_000), Some(30));
        assert_eq!(rec.all_time_total, 30);
    }

    #[test]
    fn touch_ignored_when_closed() {
        let mut rec = TimeTrackingRecord::new(NOON);
        rec.touch(NOON + 1_000);
        assert_eq!(rec.last_active_timestamp, NOON);
    }

    #[test]
    fn rolling_windows_sum_calendar_days() {
        let mut rec = TimeTrackingRecord::new(NOON);
        rec.daily_totals.insert("2024-03-10".into(), 100);
        rec.daily_totals.insert("2024-03-09".into(), 50);
        rec.daily_totals.insert("2024-03-04".into(), 25);
        rec.daily_totals.insert("2024-02-01".into(), 7);
        rec.all_time_total = 182;

        assert_eq!(rec.time_spent(Period::Last24h, NOON), 100);
        assert_eq!(rec.time_spent(Period::Last7d, NOON), 175);
        assert_eq!(rec.time_spent(Period::Last30d, NOON), 175);
        assert_eq!(rec.time_spent(Period::AllTime, NOON), 182);
    }

    #[test]
    fn rolling_window_includes_open_session() {
        let mut rec = TimeTrackingRecord::new(NOON);
        rec.daily_totals.insert("2024-03-10".into(), 10);
        rec.open_session(NOON);
        assert_eq!(rec.time_spent(Period::Last24h, NOON + 20_000), 30);
        assert_eq!(rec.time_spent(Period::AllTime, NOON + 20_000), 0);
    }

    #[test]
    fn prune_drops_entries_before_cutoff() {
        let mut rec = TimeTrackingRecord::new(NOON);
        rec.daily_totals.insert("2024-01-01".into(), 1);
        rec.daily_totals.insert("2024-02-09".into(), 2);
        rec.daily_totals.insert("2024-03-10".into(), 3);

        let cutoff = date_of(NOON - 30 * DAY_MS);
        assert_eq!(rec.prune_before(cutoff), 1);
        assert_eq!(rec.daily_totals.len(), 2);
    }

    #[test]
    fn reset_statistics_discards_open_session() {
        let mut rec = TimeTrackingRecord::new(NOON - DAY_MS);
        rec.open_session(NOON - 5_000);
        rec.all_time_total = 400;
        rec.reset_statistics(NOON);
        assert_eq!(rec.all_time_total, 0);
        assert!(!rec.is_session_open());
        assert_eq!(rec.tracking_start_date, "2024-03-10");
    }

    #[test]
    fn period_parses_cli_names() {
        assert_eq!("7d".parse::<Period>().unwrap(), Period::Last7d);
        assert_eq!(Period::AllTime.to_string(), "alltime");
        assert!("1y".parse::<Period>().is_err());
    }
}
