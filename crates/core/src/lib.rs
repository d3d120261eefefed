//! Domain layer for the eGauge liveness monitor.
//!
//! Holds the pure monitoring state machine and the seams to the outside
//! world:
//!
//! - [`GroupMonitor`]: per-group consecutive-failure counter and alert
//!   trigger policy.
//! - [`DeviceGroup`] / [`FreshnessWindow`]: what is checked and how far
//!   back "recent" reaches.
//! - [`FreshnessChecker`] and [`AlertChannel`]: collaborator traits
//!   implemented by the database and Discord crates.

pub mod alert;
pub mod device_group;
pub mod error;
pub mod freshness;
pub mod group_monitor;
pub mod types;

pub use alert::{AlertChannel, AlertEvent, DeliveryError};
pub use device_group::DeviceGroup;
pub use error::CoreError;
pub use freshness::{FreshnessChecker, FreshnessWindow};
pub use group_monitor::{GroupMonitor, MonitorSettings};
