//! Active-Context Tracker.
//!
//! Owns the single countdown and the single open usage session, both tied
//! to whichever domain currently holds focus.
//!
//! ```text
//! Idle --focus_gained(D), D tracked, timeLeft > 0--> Tracking(D)
//! Tracking(D) --focus_gained(E)--> Tracking(E) | Idle
//! Tracking(D) --focus_lost / container_closed--> Idle
//! Tracking(D) --tick: budget exhausted | D removed--> Idle
//! Tracking(D) --tick: focus moved to E--> Tracking(E) | Idle
//! ```
//!
//! Focus handlers are serialized by an in-progress flag: a call arriving
//! while another is in flight is dropped, not queued; the running handler
//! re-reads focus before it returns and follows it. Every handler fully
//! stops the previous countdown (and waits for its task to exit) before
//! opening anything new.

mod countdown;
mod focus;
mod reaper;

pub use focus::{BlockAction, FocusEvent, FocusProbe, SharedFocus};
pub use reaper::TrackerHandle;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::{to_datetime, Clock};
use crate::domain::normalize_domain;
use crate::events::TrackerEvent;
use crate::storage::{Records, TrackerSettings};
use crate::tracking::TimeTrackingRecord;

const EVENT_CAPACITY: usize = 256;

/// Upper bound on back-to-back transitions one handler makes while
/// chasing a focus that keeps moving.
const MAX_FOCUS_PASSES: usize = 4;

fn focused_key(domain: Option<&str>) -> Option<String> {
    domain.map(normalize_domain).filter(|d| !d.is_empty())
}

/// What the tracker is doing right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrackerState {
    Idle,
    Tracking { domain: String },
}

/// Result of one focus transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusOutcome {
    /// Countdown and session are running for `domain`.
    Counting { domain: String, time_left: i64 },
    /// Budget already spent; the block action was invoked.
    Blocked { domain: String },
    /// No timer exists for `domain`.
    Untracked { domain: String },
    /// Nothing is focused.
    Idle,
    /// A storage failure aborted the transition; the next event retries.
    Skipped,
    /// Another focus transition was still in flight.
    Dropped,
}

struct Countdown {
    id: u64,
    domain: String,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Countdown {
    async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            if !e.is_cancelled() {
                warn!(domain = %self.domain, error = %e, "countdown task failed");
            }
        }
    }
}

/// Clears the in-progress flag when a handler returns, on every path.
struct HandlingGuard<'a>(&'a AtomicBool);

impl<'a> HandlingGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for HandlingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct ActiveContextTracker {
    records: Records,
    focus: Arc<dyn FocusProbe>,
    blocker: Arc<dyn BlockAction>,
    clock: Arc<dyn Clock>,
    settings: TrackerSettings,
    countdown: Arc<Mutex<Option<Countdown>>>,
    handling: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
    events: broadcast::Sender<TrackerEvent>,
}

impl ActiveContextTracker {
    pub fn new(
        records: Records,
        focus: Arc<dyn FocusProbe>,
        blocker: Arc<dyn BlockAction>,
        clock: Arc<dyn Clock>,
        settings: TrackerSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            records,
            focus,
            blocker,
            clock,
            settings,
            countdown: Arc::new(Mutex::new(None)),
            handling: Arc::new(AtomicBool::new(false)),
            next_id: Arc::new(AtomicU64::new(1)),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> TrackerState {
        match self.countdown.lock().await.as_ref() {
            Some(countdown) => TrackerState::Tracking {
                domain: countdown.domain.clone(),
            },
            None => TrackerState::Idle,
        }
    }

    /// Route one notifier event to its transition.
    pub async fn handle_event(&self, event: FocusEvent) -> FocusOutcome {
        match event {
            FocusEvent::Closed { .. } => self.container_closed().await,
            FocusEvent::Focus {
                domain: Some(domain),
                is_active: true,
                timestamp,
            } => {
                debug!(domain = %domain, ?timestamp, "focus event");
                self.focus_gained(&domain).await
            }
            FocusEvent::Focus { .. } => self.focus_lost().await,
        }
    }

    /// Focus moved to `domain`.
    pub async fn focus_gained(&self, domain: &str) -> FocusOutcome {
        let Some(_guard) = HandlingGuard::try_acquire(&self.handling) else {
            debug!(domain, "focus change already in flight, dropping");
            return FocusOutcome::Dropped;
        };
        self.switch_to(Some(domain)).await
    }

    /// Nothing holds focus any more.
    pub async fn focus_lost(&self) -> FocusOutcome {
        let Some(_guard) = HandlingGuard::try_acquire(&self.handling) else {
            debug!("focus change already in flight, dropping");
            return FocusOutcome::Dropped;
        };
        self.switch_to(None).await
    }

    /// The container holding the tracked session was destroyed. Tracking
    /// resumes for whatever the probe reports as focused now.
    pub async fn container_closed(&self) -> FocusOutcome {
        let Some(_guard) = HandlingGuard::try_acquire(&self.handling) else {
            debug!("focus change already in flight, dropping");
            return FocusOutcome::Dropped;
        };
        let next = self.focus.focused_domain().await;
        self.switch_to(next.as_deref()).await
    }

    /// Re-run the focus transition for the currently focused domain, so a
    /// replenished budget is picked up by a fresh countdown.
    pub async fn restart(&self) -> FocusOutcome {
        let Some(_guard) = HandlingGuard::try_acquire(&self.handling) else {
            debug!("focus change already in flight, dropping restart");
            return FocusOutcome::Dropped;
        };
        let current = self.focus.focused_domain().await;
        self.switch_to(current.as_deref()).await
    }

    /// Stop the countdown and close every open session.
    pub async fn stop(&self) {
        self.stop_tracking().await;
    }

    /// Runs under the in-progress guard. Calls dropped while the guard was
    /// held are caught up here: once a transition settles, focus is read
    /// again and tracking follows focus if it moved meanwhile.
    async fn switch_to(&self, domain: Option<&str>) -> FocusOutcome {
        let mut target = focused_key(domain);
        let mut passes = 0;
        loop {
            self.stop_tracking().await;
            let outcome = match target.clone() {
                Some(domain) => self.begin(domain).await,
                None => FocusOutcome::Idle,
            };

            let focused = focused_key(self.focus.focused_domain().await.as_deref());
            passes += 1;
            if focused == target || passes >= MAX_FOCUS_PASSES {
                return outcome;
            }
            debug!(from = ?target, to = ?focused, "focus moved during transition, following");
            target = focused;
        }
    }

    async fn begin(&self, domain: String) -> FocusOutcome {
        let now = self.clock.now_ms();

        let refreshed = self
            .records
            .update_domain_timers(|timers| {
                let timer = timers.get_mut(&domain)?;
                let next = timer.check_interval_reset(now);
                let was_reset = next != *timer;
                *timer = next.clone();
                Some((next, was_reset))
            })
            .await;

        let (timer, was_reset) = match refreshed {
            Ok(Some(found)) => found,
            Ok(None) => {
                debug!(domain = %domain, "untracked domain");
                return FocusOutcome::Untracked { domain };
            }
            Err(e) => {
                warn!(domain = %domain, error = %e, "timer lookup failed, skipping");
                return FocusOutcome::Skipped;
            }
        };

        if was_reset {
            info!(domain = %domain, time_left = timer.time_left, "budget replenished");
            self.emit(TrackerEvent::TimerReset {
                domain: domain.clone(),
                time_left: timer.time_left,
                at: to_datetime(now),
            });
        }

        if timer.time_left <= 0 {
            self.block_exhausted(&domain, now, !timer.expired_message_logged)
                .await;
            return FocusOutcome::Blocked { domain };
        }

        let opened = self
            .records
            .update_time_tracking(|tracking| {
                tracking
                    .entry(domain.clone())
                    .or_insert_with(|| TimeTrackingRecord::new(now))
                    .open_session(now);
            })
            .await;
        if let Err(e) = opened {
            warn!(domain = %domain, error = %e, "could not open session, skipping");
            return FocusOutcome::Skipped;
        }

        self.start_countdown(&domain).await;
        info!(domain = %domain, time_left = timer.time_left, "countdown started");
        self.emit(TrackerEvent::CountdownStarted {
            domain: domain.clone(),
            time_left: timer.time_left,
            at: to_datetime(now),
        });

        FocusOutcome::Counting {
            domain,
            time_left: timer.time_left,
        }
    }

    async fn block_exhausted(&self, domain: &str, now: i64, mark_logged: bool) {
        if mark_logged {
            let marked = self
                .records
                .update_domain_timers(|timers| {
                    if let Some(timer) = timers.get_mut(domain) {
                        timer.expired_message_logged = true;
                    }
                })
                .await;
            if let Err(e) = marked {
                warn!(domain, error = %e, "could not mark budget as reported");
            }
        }
        self.block(domain, now);
    }

    fn block(&self, domain: &str, now: i64) {
        info!(domain, "budget exhausted, blocking view");
        self.blocker.block_current_view(domain);
        self.emit(TrackerEvent::Blocked {
            domain: domain.to_string(),
            at: to_datetime(now),
        });
    }

    async fn start_countdown(&self, domain: &str) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(countdown::run(
            self.clone(),
            id,
            domain.to_string(),
            stop_rx,
        ));

        let previous = self.countdown.lock().await.replace(Countdown {
            id,
            domain: domain.to_string(),
            stop_tx,
            handle,
        });
        if let Some(previous) = previous {
            previous.stop().await;
        }
    }

    /// Stop the countdown task and wait for it to exit, then fold every
    /// open session. Leftover idle sessions end at their last activity.
    async fn stop_tracking(&self) {
        let running = self.countdown.lock().await.take();
        if let Some(countdown) = running {
            debug!(domain = %countdown.domain, "stopping countdown");
            countdown.stop().await;
        }

        let now = self.clock.now_ms();
        match self.records.close_all_sessions(now, self.idle_threshold_ms()).await {
            Ok(closed) => {
                for (domain, seconds) in closed {
                    self.emit(TrackerEvent::SessionClosed {
                        domain,
                        seconds,
                        at: to_datetime(now),
                    });
                }
            }
            Err(e) => warn!(error = %e, "could not close sessions"),
        }
    }

    /// Called by a countdown task that is ending on its own.
    async fn release_countdown(&self, id: u64) {
        let mut slot = self.countdown.lock().await;
        if slot.as_ref().is_some_and(|c| c.id == id) {
            *slot = None;
        }
    }

    async fn close_session(&self, domain: &str, end: i64) {
        let closed = self
            .records
            .update_time_tracking(|tracking| {
                tracking
                    .get_mut(domain)
                    .and_then(|record| record.close_session(end))
            })
            .await;
        match closed {
            Ok(Some(seconds)) => self.emit(TrackerEvent::SessionClosed {
                domain: domain.to_string(),
                seconds,
                at: to_datetime(end),
            }),
            Ok(None) => {}
            Err(e) => warn!(domain, error = %e, "could not close session"),
        }
    }

    fn idle_threshold_ms(&self) -> i64 {
        i64::try_from(self.settings.idle_threshold.as_millis()).unwrap_or(i64::MAX)
    }

    fn emit(&self, event: TrackerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
