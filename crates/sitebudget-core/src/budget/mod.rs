//! Timer State Engine: pure budget arithmetic for tracked domains.

mod timer;

#[cfg(test)]
mod properties;

use std::collections::BTreeMap;

pub use timer::{should_reset, DomainTimer, Reconciliation, HOUR_MS};

/// Hostname -> timer, as persisted under the `domainTimers` key.
pub type DomainTimerMap = BTreeMap<String, DomainTimer>;
