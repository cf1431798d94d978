use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every state change in the tracker produces an Event.
/// Observers subscribe through [`ActiveContextTracker::subscribe`](crate::tracker::ActiveContextTracker::subscribe).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TrackerEvent {
    CountdownStarted {
        domain: String,
        time_left: i64,
        at: DateTime<Utc>,
    },
    TimerDecremented {
        domain: String,
        time_left: i64,
        at: DateTime<Utc>,
    },
    /// The budget crossed into zero for this cycle.
    BudgetExhausted {
        domain: String,
        at: DateTime<Utc>,
    },
    /// The block action was invoked for the focused view.
    Blocked {
        domain: String,
        at: DateTime<Utc>,
    },
    SessionClosed {
        domain: String,
        seconds: i64,
        at: DateTime<Utc>,
    },
    /// An inactive session was closed at its last activity instant.
    IdleSessionReaped {
        domain: String,
        seconds: i64,
        at: DateTime<Utc>,
    },
    /// A timer was replenished by its reset interval or by a settings edit.
    TimerReset {
        domain: String,
        time_left: i64,
        at: DateTime<Utc>,
    },
}

impl TrackerEvent {
    pub fn domain(&self) -> &str {
        match self {
            Self::CountdownStarted { domain, .. }
            | Self::TimerDecremented { domain, .. }
            | Self::BudgetExhausted { domain, .. }
            | Self::Blocked { domain, .. }
            | Self::SessionClosed { domain, .. }
            | Self::IdleSessionReaped { domain, .. }
            | Self::TimerReset { domain, .. } => domain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = TrackerEvent::Blocked {
            domain: "x.com".into(),
            at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Blocked");
        assert_eq!(json["domain"], "x.com");
        assert_eq!(event.domain(), "x.com");
    }
}
