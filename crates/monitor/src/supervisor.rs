//! Runs the alert channel lifecycle and the monitor loop side by side.
//!
//! Whichever finishes first (either unit, or the shutdown signal) starts
//! teardown: the shared token is cancelled, the other unit gets a grace
//! period to stop, and both external connections are closed.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ewatch_core::{AlertChannel, FreshnessChecker};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const CHANNEL_UNIT: &str = "alert_channel";
const MONITOR_UNIT: &str = "monitor_loop";

/// What started the shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal,
    ChannelExited,
    MonitorExited,
}

/// A unit that ended with an error, panicked, or overran the grace period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    pub unit: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub reason: ShutdownReason,
    pub failures: Vec<UnitFailure>,
}

impl ShutdownReport {
    /// `true` only for a signal-initiated shutdown where every unit stopped cleanly.
    pub fn is_clean(&self) -> bool {
        self.reason == ShutdownReason::Signal && self.failures.is_empty()
    }
}

type UnitHandle = JoinHandle<Result<(), String>>;

enum FirstExit {
    Signal,
    Channel(Result<Result<(), String>, JoinError>),
    Monitor(Result<Result<(), String>, JoinError>),
}

pub struct Supervisor {
    checker: Arc<dyn FreshnessChecker>,
    channel: Arc<dyn AlertChannel>,
    grace: Duration,
    cancel: CancellationToken,
}

impl Supervisor {
    pub fn new(
        checker: Arc<dyn FreshnessChecker>,
        channel: Arc<dyn AlertChannel>,
        grace: Duration,
    ) -> Self {
        Self {
            checker,
            channel,
            grace,
            cancel: CancellationToken::new(),
        }
    }

    /// Token both units must observe. Cancelled when teardown starts.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn both units and block until shutdown completes.
    ///
    /// `shutdown` resolves when the process is asked to stop, usually
    /// [`crate::signal::shutdown_signal`].
    pub async fn run<C, CE, M, ME, S>(
        self,
        channel_unit: C,
        monitor_unit: M,
        shutdown: S,
    ) -> ShutdownReport
    where
        C: Future<Output = Result<(), CE>> + Send + 'static,
        CE: Display + Send + 'static,
        M: Future<Output = Result<(), ME>> + Send + 'static,
        ME: Display + Send + 'static,
        S: Future<Output = ()>,
    {
        let mut channel_handle = spawn_unit(channel_unit);
        let mut monitor_handle = spawn_unit(monitor_unit);
        tokio::pin!(shutdown);

        let first = tokio::select! {
            () = &mut shutdown => FirstExit::Signal,
            res = &mut channel_handle => FirstExit::Channel(res),
            res = &mut monitor_handle => FirstExit::Monitor(res),
        };

        let mut failures = Vec::new();
        let (reason, remaining) = match first {
            FirstExit::Signal => {
                tracing::info!("Shutdown signal received, stopping monitor");
                (
                    ShutdownReason::Signal,
                    vec![(CHANNEL_UNIT, channel_handle), (MONITOR_UNIT, monitor_handle)],
                )
            }
            FirstExit::Channel(res) => {
                tracing::warn!("Alert channel stopped, shutting down");
                record(CHANNEL_UNIT, res, &mut failures);
                (ShutdownReason::ChannelExited, vec![(MONITOR_UNIT, monitor_handle)])
            }
            FirstExit::Monitor(res) => {
                tracing::warn!("Monitor loop stopped, shutting down");
                record(MONITOR_UNIT, res, &mut failures);
                (ShutdownReason::MonitorExited, vec![(CHANNEL_UNIT, channel_handle)])
            }
        };

        self.cancel.cancel();

        let deadline = Instant::now() + self.grace;
        for (unit, mut handle) in remaining {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(res) => record(unit, res, &mut failures),
                Err(_) => {
                    tracing::error!(
                        unit,
                        grace_secs = self.grace.as_secs(),
                        "Unit did not stop within grace period, aborting",
                    );
                    handle.abort();
                    failures.push(UnitFailure {
                        unit,
                        error: format!("did not stop within {:?}", self.grace),
                    });
                }
            }
        }

        self.channel.close().await;
        self.checker.close().await;

        let report = ShutdownReport { reason, failures };
        tracing::info!(
            reason = ?report.reason,
            failures = report.failures.len(),
            "Shutdown complete",
        );
        report
    }
}

fn spawn_unit<F, E>(unit: F) -> UnitHandle
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(async move { unit.await.map_err(|e| e.to_string()) })
}

fn record(
    unit: &'static str,
    res: Result<Result<(), String>, JoinError>,
    failures: &mut Vec<UnitFailure>,
) {
    match res {
        Ok(Ok(())) => tracing::info!(unit, "Unit stopped"),
        Ok(Err(error)) => {
            tracing::error!(unit, error = %error, "Unit failed");
            failures.push(UnitFailure { unit, error });
        }
        Err(e) => {
            let error = if e.is_panic() {
                "panicked".to_string()
            } else {
                e.to_string()
            };
            tracing::error!(unit, error = %error, "Unit did not complete");
            failures.push(UnitFailure { unit, error });
        }
    }
}
