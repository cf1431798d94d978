//! Active-context notifier and block-action contracts.

use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::normalize_domain;

/// One notification from the active-context notifier.
///
/// Decoded from JSON lines such as
/// `{"domain": "x.com", "isActive": true, "timestamp": 1710072000000}` or
/// `{"closed": true}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FocusEvent {
    /// The focused container was destroyed. `active` names whatever is
    /// focused afterwards, if anything.
    Closed {
        closed: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        active: Option<String>,
    },
    Focus {
        domain: Option<String>,
        #[serde(rename = "isActive")]
        is_active: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
}

impl FocusEvent {
    pub fn focus(domain: impl Into<String>) -> Self {
        Self::Focus {
            domain: Some(domain.into()),
            is_active: true,
            timestamp: None,
        }
    }

    pub fn blur() -> Self {
        Self::Focus {
            domain: None,
            is_active: false,
            timestamp: None,
        }
    }

    pub fn closed(active: Option<String>) -> Self {
        Self::Closed {
            closed: true,
            active,
        }
    }

    /// The domain focused once this event has been applied.
    pub fn focused_after(&self) -> Option<String> {
        match self {
            Self::Closed { active, .. } => active.clone(),
            Self::Focus {
                domain: Some(domain),
                is_active: true,
                ..
            } => Some(domain.clone()),
            Self::Focus { .. } => None,
        }
    }
}

/// Answers "which domain holds focus right now".
///
/// Ticks query this before every decrement so a countdown never charges a
/// domain that lost focus while the tick was pending.
#[async_trait]
pub trait FocusProbe: Send + Sync {
    async fn focused_domain(&self) -> Option<String>;
}

/// Invoked when an exhausted domain is on screen. Fire-and-forget.
pub trait BlockAction: Send + Sync {
    fn block_current_view(&self, domain: &str);
}

/// Focus state fed directly from a [`FocusEvent`] stream.
#[derive(Debug, Default)]
pub struct SharedFocus {
    current: RwLock<Option<String>>,
}

impl SharedFocus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, domain: Option<&str>) {
        let value = domain.map(normalize_domain).filter(|d| !d.is_empty());
        match self.current.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }

    pub fn apply(&self, event: &FocusEvent) {
        self.set(event.focused_after().as_deref());
    }

    pub fn get(&self) -> Option<String> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl FocusProbe for SharedFocus {
    async fn focused_domain(&self) -> Option<String> {
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_focus_lines() {
        let event: FocusEvent =
            serde_json::from_str(r#"{"domain":"X.com","isActive":true,"timestamp":5}"#).unwrap();
        assert_eq!(
            event,
            FocusEvent::Focus {
                domain: Some("X.com".into()),
                is_active: true,
                timestamp: Some(5),
            }
        );

        let closed: FocusEvent = serde_json::from_str(r#"{"closed":true}"#).unwrap();
        assert_eq!(closed, FocusEvent::closed(None));
    }

    #[test]
    fn inactive_focus_means_nothing_focused() {
        let event: FocusEvent =
            serde_json::from_str(r#"{"domain":"x.com","isActive":false}"#).unwrap();
        assert_eq!(event.focused_after(), None);
    }

    #[test]
    fn shared_focus_normalizes() {
        let focus = SharedFocus::new();
        focus.apply(&FocusEvent::focus(" WWW.Reddit.com "));
        assert_eq!(focus.get().as_deref(), Some("www.reddit.com"));

        focus.apply(&FocusEvent::closed(Some("x.com".into())));
        assert_eq!(focus.get().as_deref(), Some("x.com"));

        focus.apply(&FocusEvent::blur());
        assert_eq!(focus.get(), None);
    }
}
