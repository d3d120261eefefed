//! The polling loop that drives every [`GroupMonitor`].
//!
//! [`MonitorLoop`] waits once for the alert channel to become ready, then
//! checks each device group in a fixed order on every tick, feeds the
//! result into that group's monitor and delivers whatever alert comes
//! back. A fault inside a freshness check never stops the loop: panics
//! and timeouts are logged and count as "no recent data". A panicking
//! delivery is logged as a failed send.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use ewatch_core::{
    AlertChannel, DeviceGroup, FreshnessChecker, FreshnessWindow, GroupMonitor, MonitorSettings,
};
use futures::FutureExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a [`MonitorLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Waiting for the alert channel to become ready.
    Starting,
    /// Ticking.
    Running,
    /// Stopped by the cancellation token. Terminal.
    Cancelled,
    /// Gave up before running because the alert channel never became
    /// ready. Terminal.
    Failed,
}

/// Reasons the loop stops without being cancelled.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Alert channel was not ready within {0:?}")]
    ReadinessTimeout(Duration),

    #[error("Alert channel closed before becoming ready")]
    ChannelClosed,
}

pub struct MonitorLoop {
    settings: MonitorSettings,
    monitors: Vec<GroupMonitor>,
    checker: Arc<dyn FreshnessChecker>,
    channel: Arc<dyn AlertChannel>,
    query_timeout: Option<Duration>,
    ready_timeout: Option<Duration>,
    state_tx: watch::Sender<MonitorState>,
}

impl MonitorLoop {
    /// One [`GroupMonitor`] is created per group, checked in the order given.
    pub fn new(
        settings: MonitorSettings,
        groups: Vec<DeviceGroup>,
        checker: Arc<dyn FreshnessChecker>,
        channel: Arc<dyn AlertChannel>,
    ) -> Self {
        let monitors = groups
            .into_iter()
            .map(|group| GroupMonitor::new(group, &settings))
            .collect();
        let (state_tx, _) = watch::channel(MonitorState::Starting);

        Self {
            settings,
            monitors,
            checker,
            channel,
            query_timeout: None,
            ready_timeout: None,
            state_tx,
        }
    }

    /// Bound each freshness check. `None` lets a check run indefinitely.
    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Give up if the alert channel is not ready in time.
    pub fn with_ready_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn subscribe_state(&self) -> watch::Receiver<MonitorState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> MonitorState {
        *self.state_tx.borrow()
    }

    pub fn monitors(&self) -> &[GroupMonitor] {
        &self.monitors
    }

    /// Run until `cancel` fires.
    ///
    /// Returns `Ok(())` on cancellation and `Err` only when the alert
    /// channel never became ready, in which case the state is `Failed`.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), MonitorError> {
        let ready = match self.await_ready(&cancel).await {
            Ok(ready) => ready,
            Err(e) => {
                self.state_tx.send_replace(MonitorState::Failed);
                return Err(e);
            }
        };
        if !ready {
            self.state_tx.send_replace(MonitorState::Cancelled);
            tracing::info!("Monitor loop cancelled before start");
            return Ok(());
        }

        self.state_tx.send_replace(MonitorState::Running);
        tracing::info!(
            groups = self.monitors.len(),
            tick_interval_mins = self.settings.tick_interval_minutes,
            failure_threshold = self.settings.failure_threshold,
            "Monitor loop running",
        );

        let tick_interval = self.settings.tick_interval();
        loop {
            if !self.tick(&cancel).await {
                break;
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(tick_interval) => {}
            }
        }

        self.state_tx.send_replace(MonitorState::Cancelled);
        tracing::info!("Monitor loop stopped");
        Ok(())
    }

    /// `Ok(false)` means cancelled while waiting.
    async fn await_ready(&self, cancel: &CancellationToken) -> Result<bool, MonitorError> {
        tracing::info!("Waiting for alert channel to become ready");

        let ready_timeout = self.ready_timeout;
        let deadline = async move {
            match ready_timeout {
                Some(limit) => {
                    tokio::time::sleep(limit).await;
                    limit
                }
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            () = cancel.cancelled() => Ok(false),
            ready = self.channel.wait_ready() => match ready {
                Ok(()) => Ok(true),
                Err(e) => {
                    tracing::error!(error = %e, "Alert channel went away before becoming ready");
                    Err(MonitorError::ChannelClosed)
                }
            },
            limit = deadline => {
                tracing::error!(timeout_secs = limit.as_secs(), "Alert channel readiness timed out");
                Err(MonitorError::ReadinessTimeout(limit))
            }
        }
    }

    /// One pass over every group. Returns `false` if cancelled mid-pass.
    async fn tick(&mut self, cancel: &CancellationToken) -> bool {
        let window = self.settings.freshness_window;

        for monitor in self.monitors.iter_mut() {
            let check = check_group(
                self.checker.as_ref(),
                monitor.group(),
                window,
                self.query_timeout,
            );
            let is_fresh = tokio::select! {
                () = cancel.cancelled() => return false,
                is_fresh = check => is_fresh,
            };

            let alert = monitor.evaluate(is_fresh);
            if is_fresh {
                tracing::debug!(group = %monitor.label(), "Recent data found");
            } else {
                tracing::warn!(
                    group = %monitor.label(),
                    failures = monitor.consecutive_failures(),
                    "No recent data detected from {} group (Failure {})",
                    monitor.label(),
                    monitor.consecutive_failures(),
                );
            }

            let Some(alert) = alert else { continue };

            if !self.channel.is_ready() {
                tracing::error!(
                    group = %alert.group_label,
                    elapsed_mins = alert.elapsed_minutes,
                    "Alert channel is not ready, alert not sent",
                );
                continue;
            }

            let deliver = AssertUnwindSafe(self.channel.deliver(&alert.message)).catch_unwind();
            let delivered = tokio::select! {
                () = cancel.cancelled() => return false,
                delivered = deliver => delivered,
            };
            match delivered {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(
                    group = %alert.group_label,
                    elapsed_mins = alert.elapsed_minutes,
                    error = %e,
                    "Failed to send alert",
                ),
                Err(_) => tracing::error!(
                    group = %alert.group_label,
                    elapsed_mins = alert.elapsed_minutes,
                    "Failed to send alert: delivery panicked",
                ),
            }
        }

        true
    }
}

/// Ask the checker about one group. Panics and timeouts count as stale.
async fn check_group(
    checker: &dyn FreshnessChecker,
    group: &DeviceGroup,
    window: FreshnessWindow,
    query_timeout: Option<Duration>,
) -> bool {
    let now = chrono::Utc::now();
    let check = AssertUnwindSafe(checker.has_recent_record(group, window, now)).catch_unwind();

    let outcome = match query_timeout {
        Some(limit) => match tokio::time::timeout(limit, check).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(
                    group = %group.label(),
                    timeout_secs = limit.as_secs(),
                    "Freshness check timed out",
                );
                return false;
            }
        },
        None => check.await,
    };

    match outcome {
        Ok(is_fresh) => is_fresh,
        Err(_) => {
            tracing::error!(group = %group.label(), "Freshness check panicked");
            false
        }
    }
}
