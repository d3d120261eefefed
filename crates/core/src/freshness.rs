//! Freshness window and the data-store capability that answers
//! "has this group reported recently?".

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::device_group::DeviceGroup;
use crate::types::Timestamp;

/// Lookback duration within which a record must exist to count as recent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessWindow(Duration);

impl FreshnessWindow {
    pub fn new(window: Duration) -> Self {
        Self(window)
    }

    pub fn from_minutes(minutes: u64) -> Self {
        Self(Duration::from_secs(minutes.saturating_mul(60)))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }

    /// Earliest timestamp still considered recent at `now`.
    ///
    /// Saturates at the minimum representable instant for windows too
    /// large to subtract.
    pub fn cutoff(&self, now: Timestamp) -> Timestamp {
        TimeDelta::from_std(self.0)
            .ok()
            .and_then(|delta| now.checked_sub_signed(delta))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Reports whether a device group has produced a record within a window.
///
/// Implementations must fail closed: any transport or query error is
/// reported as `false` (not fresh) and never surfaces to the caller.
#[async_trait]
pub trait FreshnessChecker: Send + Sync {
    /// `true` if at least one record from `group` exists at or after
    /// `window.cutoff(now)`.
    async fn has_recent_record(
        &self,
        group: &DeviceGroup,
        window: FreshnessWindow,
        now: Timestamp,
    ) -> bool;

    /// Release the underlying connection. Called once during teardown.
    async fn close(&self) {}
}
