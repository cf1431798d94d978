//! Usage history: sessions, daily totals and rolling windows.

mod record;

use std::collections::BTreeMap;

pub use record::{Period, TimeTrackingRecord};

/// Hostname -> usage record, as persisted under the `timeTracking` key.
pub type TimeTrackingMap = BTreeMap<String, TimeTrackingRecord>;
