use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::ActiveContextTracker;
use crate::budget::DomainTimer;
use crate::clock::to_datetime;
use crate::domain::normalize_domain;
use crate::events::TrackerEvent;

/// One tick consumes exactly one second of budget.
const TICK: Duration = Duration::from_secs(1);

enum TickOutcome {
    Continue,
    Stop,
    /// Another domain took focus before this tick ran.
    FocusMoved,
}

struct Decremented {
    timer: DomainTimer,
    was_reset: bool,
    crossed_zero: bool,
}

/// Countdown loop for one focused domain. Exits when stopped by the tracker
/// or when a tick decides tracking is over.
///
/// Boxed because following a focus move restarts the tracker, which spawns
/// the next countdown.
pub(super) fn run(
    tracker: ActiveContextTracker,
    id: u64,
    domain: String,
    mut stop_rx: watch::Receiver<bool>,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        let mut interval = time::interval_at(Instant::now() + TICK, TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                _ = interval.tick() => {}
            }

            match tracker.tick(&domain).await {
                TickOutcome::Continue => {}
                TickOutcome::Stop => {
                    tracker.release_countdown(id).await;
                    break;
                }
                TickOutcome::FocusMoved => {
                    tracker.release_countdown(id).await;
                    let stopped = *stop_rx.borrow();
                    if !stopped {
                        let outcome = tracker.restart().await;
                        debug!(domain = %domain, ?outcome, "followed focus after stale tick");
                    }
                    break;
                }
            }
        }
        debug!(domain = %domain, "countdown exited");
    })
}

impl ActiveContextTracker {
    async fn still_focused(&self, domain: &str) -> bool {
        self.focus
            .focused_domain()
            .await
            .is_some_and(|focused| normalize_domain(&focused) == domain)
    }

    async fn tick(&self, domain: &str) -> TickOutcome {
        let now = self.clock.now_ms();

        let focused = self.focus.focused_domain().await.map(|d| normalize_domain(&d));
        if focused.as_deref() != Some(domain) {
            debug!(domain, ?focused, "focus moved before tick, stopping");
            self.close_session(domain, now).await;
            return match focused {
                Some(other) if !other.is_empty() => TickOutcome::FocusMoved,
                _ => TickOutcome::Stop,
            };
        }

        // Re-read on every tick so a concurrent settings edit wins.
        let decremented = self
            .records
            .update_domain_timers(|timers| {
                let timer = timers.get_mut(domain)?;
                let refreshed = timer.check_interval_reset(now);
                let was_reset = refreshed != *timer;
                let next = refreshed.decrement_one_tick();
                let crossed_zero = !refreshed.expired_message_logged && next.expired_message_logged;
                *timer = next.clone();
                Some(Decremented {
                    timer: next,
                    was_reset,
                    crossed_zero,
                })
            })
            .await;

        let step = match decremented {
            Ok(Some(step)) => step,
            Ok(None) => {
                info!(domain, "timer removed while counting, stopping");
                self.close_session(domain, now).await;
                return TickOutcome::Stop;
            }
            Err(e) => {
                warn!(domain, error = %e, "tick skipped");
                return TickOutcome::Continue;
            }
        };

        if step.was_reset {
            self.emit(TrackerEvent::TimerReset {
                domain: domain.to_string(),
                time_left: step.timer.original_time,
                at: to_datetime(now),
            });
        }
        self.emit(TrackerEvent::TimerDecremented {
            domain: domain.to_string(),
            time_left: step.timer.time_left,
            at: to_datetime(now),
        });

        let touched = self
            .records
            .update_time_tracking(|tracking| {
                if let Some(record) = tracking.get_mut(domain) {
                    record.touch(now);
                }
            })
            .await;
        if let Err(e) = touched {
            warn!(domain, error = %e, "could not record activity");
        }

        if !step.timer.is_exhausted() {
            return TickOutcome::Continue;
        }

        self.close_session(domain, now).await;
        if step.crossed_zero {
            self.emit(TrackerEvent::BudgetExhausted {
                domain: domain.to_string(),
                at: to_datetime(now),
            });
            if self.still_focused(domain).await {
                self.block(domain, now);
            }
        }
        TickOutcome::Stop
    }
}
