//! Consecutive-failure tracking and alert trigger policy for one device
//! group.
//!
//! Pure logic, no I/O. The monitor loop runs the freshness query and
//! feeds the boolean result into [`GroupMonitor::evaluate`] once per tick.

use std::time::Duration;

use crate::alert::AlertEvent;
use crate::device_group::DeviceGroup;
use crate::error::CoreError;
use crate::freshness::FreshnessWindow;

/// Default polling period in minutes.
pub const DEFAULT_TICK_INTERVAL_MINUTES: u32 = 2;

/// Default lookback window in minutes.
pub const DEFAULT_FRESHNESS_WINDOW_MINUTES: u64 = 2;

/// Default number of back-to-back failed checks before alerting.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Cadence and trigger policy shared by every group monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Sleep between passes; also the unit of `elapsed_minutes` in alerts.
    pub tick_interval_minutes: u32,
    /// How far back a record may be and still count as recent.
    pub freshness_window: FreshnessWindow,
    /// Consecutive failures required before an alert fires.
    pub failure_threshold: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            tick_interval_minutes: DEFAULT_TICK_INTERVAL_MINUTES,
            freshness_window: FreshnessWindow::from_minutes(DEFAULT_FRESHNESS_WINDOW_MINUTES),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

impl MonitorSettings {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.tick_interval_minutes == 0 {
            return Err(CoreError::Validation(
                "tick interval must be at least one minute".into(),
            ));
        }
        if self.failure_threshold == 0 {
            return Err(CoreError::Validation(
                "failure threshold must be positive".into(),
            ));
        }
        if self.freshness_window.duration().is_zero() {
            return Err(CoreError::Validation(
                "freshness window must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.tick_interval_minutes) * 60)
    }
}

/// Failure counter and threshold logic for a single device group.
///
/// Owned exclusively by the monitor loop; the counter is the only
/// mutable state.
#[derive(Debug, Clone)]
pub struct GroupMonitor {
    group: DeviceGroup,
    consecutive_failures: u32,
    threshold: u32,
    tick_interval_minutes: u32,
}

impl GroupMonitor {
    pub fn new(group: DeviceGroup, settings: &MonitorSettings) -> Self {
        Self {
            group,
            consecutive_failures: 0,
            threshold: settings.failure_threshold,
            tick_interval_minutes: settings.tick_interval_minutes,
        }
    }

    pub fn group(&self) -> &DeviceGroup {
        &self.group
    }

    pub fn label(&self) -> &str {
        self.group.label()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Apply one freshness result.
    ///
    /// A fresh result resets the streak. A stale result extends it and,
    /// once the streak reaches the threshold, yields an alert on every
    /// such tick until the group recovers.
    pub fn evaluate(&mut self, is_fresh: bool) -> Option<AlertEvent> {
        if is_fresh {
            self.consecutive_failures = 0;
            return None;
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures < self.threshold {
            return None;
        }

        let elapsed_minutes =
            u64::from(self.consecutive_failures) * u64::from(self.tick_interval_minutes);
        Some(AlertEvent::new(self.group.label(), elapsed_minutes))
    }
}
