//! Wall-clock source in epoch milliseconds.

use chrono::{DateTime, NaiveDate, Utc};

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Reads `chrono::Utc::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        now_ms()
    }
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

/// UTC calendar date of an epoch-millisecond timestamp.
pub fn date_of(ms: i64) -> NaiveDate {
    to_datetime(ms).date_naive()
}

/// `YYYY-MM-DD` key used by `dailyTotals`.
pub fn date_key(ms: i64) -> String {
    date_of(ms).format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_key_is_utc() {
        // 2024-03-01T23:59:59.999Z
        assert_eq!(date_key(1_709_337_599_999), "2024-03-01");
        assert_eq!(date_key(1_709_337_600_000), "2024-03-02");
    }
}
