use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::ActiveContextTracker;
use crate::clock::to_datetime;
use crate::events::TrackerEvent;

impl ActiveContextTracker {
    /// Close every session with no activity for the idle threshold,
    /// ending it at its last activity instant. Returns how many closed.
    pub async fn reap_idle_sessions(&self) -> usize {
        let now = self.clock.now_ms();
        let threshold_ms = self.idle_threshold_ms();

        let reaped = self
            .records
            .update_time_tracking(|tracking| {
                tracking
                    .iter_mut()
                    .filter_map(|(domain, record)| {
                        let end = record.last_active_timestamp;
                        record
                            .close_if_idle(now, threshold_ms)
                            .map(|seconds| (domain.clone(), seconds, end))
                    })
                    .collect::<Vec<_>>()
            })
            .await;

        match reaped {
            Ok(reaped) => {
                for (domain, seconds, end) in &reaped {
                    info!(domain = %domain, seconds, "closed idle session");
                    self.emit(TrackerEvent::IdleSessionReaped {
                        domain: domain.clone(),
                        seconds: *seconds,
                        at: to_datetime(*end),
                    });
                }
                reaped.len()
            }
            Err(e) => {
                warn!(error = %e, "idle sweep skipped");
                0
            }
        }
    }

    /// Start the idle-session reaper on its own cadence.
    pub fn spawn_background(&self) -> TrackerHandle {
        let tracker = self.clone();
        let period = self.settings.reaper_interval;
        let reaper = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let closed = tracker.reap_idle_sessions().await;
                debug!(closed, "idle sweep");
            }
        });

        TrackerHandle {
            tracker: self.clone(),
            reaper,
        }
    }
}

/// Background tasks of a running tracker.
pub struct TrackerHandle {
    tracker: ActiveContextTracker,
    reaper: JoinHandle<()>,
}

impl TrackerHandle {
    /// Stop the reaper, then the countdown, folding any open session.
    pub async fn shutdown(self) {
        self.reaper.abort();
        if let Err(e) = self.reaper.await {
            if !e.is_cancelled() {
                warn!(error = %e, "reaper task failed");
            }
        }
        self.tracker.stop().await;
        info!("tracker stopped");
    }
}
