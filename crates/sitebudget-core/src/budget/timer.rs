//! Per-domain budget timer.
//!
//! A [`DomainTimer`] is a plain value: every transition takes `&self` and
//! returns an updated copy. Nothing here performs I/O or reads the wall
//! clock; callers pass `now` (epoch milliseconds) explicitly.
//!
//! ## Transitions
//!
//! ```text
//! fresh (timeLeft = originalTime)
//!   -- decrement_one_tick --> ... --> exhausted (timeLeft = 0, expiredMessageLogged)
//!   -- check_interval_reset(now >= lastReset + interval) --> fresh
//!   -- reconcile_settings_change(...) --> fresh | settings-only update
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Milliseconds in one hour.
pub const HOUR_MS: i64 = 60 * 60 * 1000;

/// Budget state for one tracked hostname.
///
/// Serialized with the camelCase field names used by the persisted
/// `domainTimers` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainTimer {
    /// Seconds granted per budget cycle.
    pub original_time: i64,
    /// Seconds remaining in the current cycle.
    pub time_left: i64,
    /// Hours between automatic replenishments.
    pub reset_interval: u32,
    /// Epoch milliseconds of the last replenishment.
    pub last_reset_timestamp: i64,
    /// Set once the exhaustion transition has been handled this cycle.
    #[serde(default)]
    pub expired_message_logged: bool,
}

/// Result of [`DomainTimer::reconcile_settings_change`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub timer: DomainTimer,
    pub was_reset: bool,
}

impl DomainTimer {
    /// Create a timer at the start of a fresh cycle.
    pub fn new(original_time: i64, reset_interval: u32, now: i64) -> Self {
        Self {
            original_time,
            time_left: original_time,
            reset_interval,
            last_reset_timestamp: now,
            expired_message_logged: false,
        }
    }

    /// Validate user-supplied settings before they reach a timer.
    pub fn validate_settings(original_time: i64, reset_interval: u32) -> Result<(), ValidationError> {
        if original_time <= 0 {
            return Err(ValidationError::InvalidBudget(original_time));
        }
        if reset_interval == 0 {
            return Err(ValidationError::InvalidInterval(reset_interval));
        }
        Ok(())
    }

    pub fn is_exhausted(&self) -> bool {
        self.time_left <= 0
    }

    pub fn reset_interval_ms(&self) -> i64 {
        i64::from(self.reset_interval) * HOUR_MS
    }

    /// Epoch milliseconds at which the next interval reset becomes due.
    pub fn next_reset_at(&self) -> i64 {
        self.last_reset_timestamp
            .saturating_add(self.reset_interval_ms())
    }

    /// Consume one second of budget.
    ///
    /// `timeLeft` never goes below zero, even when the input already is.
    /// `expiredMessageLogged` flips to true only on the transition into
    /// zero; at zero the call is idempotent.
    pub fn decrement_one_tick(&self) -> Self {
        let time_left = self.time_left.saturating_sub(1).max(0);
        let mut next = Self {
            time_left,
            ..self.clone()
        };
        if time_left == 0 && !self.expired_message_logged {
            next.expired_message_logged = true;
        }
        next
    }

    /// Replenish the budget if the reset interval has elapsed.
    ///
    /// The comparison is inclusive: a check at exactly
    /// `lastResetTimestamp + resetInterval` fires.
    pub fn check_interval_reset(&self, now: i64) -> Self {
        if now >= self.next_reset_at() {
            self.replenished(now)
        } else {
            self.clone()
        }
    }

    /// Apply an edited budget/interval.
    ///
    /// The countdown restarts when the budget size changed, or when the
    /// remaining time would exceed the new budget (this also repairs a
    /// stored `timeLeft > originalTime`). Otherwise only the settings move.
    pub fn reconcile_settings_change(
        &self,
        new_original_time: i64,
        new_reset_interval: u32,
        now: i64,
    ) -> Reconciliation {
        let was_reset = should_reset(self.original_time, new_original_time, self.time_left);

        let mut timer = Self {
            original_time: new_original_time,
            reset_interval: new_reset_interval,
            ..self.clone()
        };
        if was_reset {
            timer = timer.replenished(now);
        }

        Reconciliation { timer, was_reset }
    }

    /// Fresh cycle at `now` with the current budget.
    pub fn replenished(&self, now: i64) -> Self {
        Self {
            time_left: self.original_time,
            last_reset_timestamp: now,
            expired_message_logged: false,
            ..self.clone()
        }
    }
}

/// Whether a settings edit restarts the countdown.
pub fn should_reset(old_original_time: i64, new_original_time: i64, current_time_left: i64) -> bool {
    old_original_time != new_original_time || current_time_left > new_original_time
}
