//! # Sitebudget Core Library
//!
//! This library provides the core logic for per-domain time budgets: how
//! much allotted time remains for each tracked hostname, when it is
//! replenished, and when a domain must be blocked. The `sitebudget` CLI is
//! a thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Timer State Engine** ([`budget`]): pure transitions on a
//!   [`DomainTimer`] value (decrement, interval reset, settings reconcile)
//! - **Active-Context Tracker** ([`tracker`]): one countdown and one usage
//!   session, tied to whichever domain holds focus
//! - **Storage** ([`storage`]): async key-value contract, SQLite and
//!   in-memory stores, typed records, TOML configuration
//! - **Registry** ([`registry`]): add/edit/remove operations used by the
//!   configuration layer
//!
//! Budgets are reset opportunistically: the interval check runs whenever a
//! timer is touched (focus change or tick), not on a precise schedule.

pub mod budget;
pub mod clock;
pub mod domain;
pub mod error;
pub mod events;
pub mod format;
pub mod registry;
pub mod storage;
pub mod tracker;
pub mod tracking;

pub use budget::{DomainTimer, DomainTimerMap, Reconciliation};
pub use clock::{Clock, SystemClock};
pub use error::{ConfigError, CoreError, StorageError, ValidationError};
pub use events::TrackerEvent;
pub use registry::{DomainOverview, DomainRegistry};
pub use storage::{Config, Database, KeyValueStore, MemoryStore, Records, TrackerSettings};
pub use tracker::{
    ActiveContextTracker, BlockAction, FocusEvent, FocusOutcome, FocusProbe, SharedFocus,
    TrackerHandle, TrackerState,
};
pub use tracking::{Period, TimeTrackingMap, TimeTrackingRecord};
