//! Teardown behaviour of [`Supervisor`].

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{groups, Journal, RecordingChannel, ScriptedChecker};
use ewatch_core::MonitorSettings;
use ewatch_monitor::{MonitorLoop, MonitorState, ShutdownReason, Supervisor};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const GRACE: Duration = Duration::from_secs(5);

struct Fixture {
    checker: Arc<ScriptedChecker>,
    channel: Arc<RecordingChannel>,
    supervisor: Supervisor,
}

fn fixture(channel_ready: bool) -> Fixture {
    let journal = Journal::default();
    let checker = Arc::new(ScriptedChecker::new(true, journal.clone()));
    let channel = Arc::new(RecordingChannel::new(channel_ready, journal));
    let supervisor = Supervisor::new(checker.clone(), channel.clone(), GRACE);
    Fixture {
        checker,
        channel,
        supervisor,
    }
}

fn monitor(fixture: &Fixture) -> MonitorLoop {
    MonitorLoop::new(
        MonitorSettings::default(),
        groups(),
        fixture.checker.clone(),
        fixture.channel.clone(),
    )
}

/// Stand-in for the gateway lifecycle: runs until cancelled.
async fn until_cancelled(cancel: CancellationToken) -> Result<(), String> {
    cancel.cancelled().await;
    Ok(())
}

async fn exploding_unit() -> Result<(), String> {
    panic!("monitor blew up")
}

#[tokio::test(start_paused = true)]
async fn signal_stops_both_units_cleanly() {
    let fixture = fixture(true);
    let mut monitor = monitor(&fixture);
    let state = monitor.subscribe_state();
    let (signal_tx, signal_rx) = oneshot::channel::<()>();

    let channel_unit = until_cancelled(fixture.supervisor.token());
    let monitor_cancel = fixture.supervisor.token();
    let monitor_unit = async move { monitor.run(monitor_cancel).await };

    let Fixture {
        checker,
        channel,
        supervisor,
    } = fixture;
    let run = tokio::spawn(supervisor.run(channel_unit, monitor_unit, async move {
        let _ = signal_rx.await;
    }));

    checker.wait_calls(2).await;
    signal_tx.send(()).unwrap();
    let report = run.await.unwrap();

    assert_eq!(report.reason, ShutdownReason::Signal);
    assert!(report.failures.is_empty());
    assert!(report.is_clean());
    assert!(channel.is_closed());
    assert!(checker.is_closed());
    assert_eq!(*state.borrow(), MonitorState::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn monitor_error_shuts_down_with_failure() {
    let fixture = fixture(false);
    let mut monitor = monitor(&fixture).with_ready_timeout(Some(Duration::from_secs(60)));

    let channel_unit = until_cancelled(fixture.supervisor.token());
    let monitor_cancel = fixture.supervisor.token();
    let monitor_unit = async move { monitor.run(monitor_cancel).await };

    let report = fixture
        .supervisor
        .run(channel_unit, monitor_unit, std::future::pending())
        .await;

    assert_eq!(report.reason, ShutdownReason::MonitorExited);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].unit, "monitor_loop");
    assert!(report.failures[0].error.contains("not ready"));
    assert!(!report.is_clean());
    assert!(fixture.channel.is_closed());
    assert!(fixture.checker.is_closed());
}

#[tokio::test(start_paused = true)]
async fn channel_failure_cancels_monitor() {
    let fixture = fixture(true);
    let mut monitor = monitor(&fixture);
    let state = monitor.subscribe_state();

    let checker = fixture.checker.clone();
    let channel_unit = async move {
        checker.wait_calls(2).await;
        Err::<(), _>("Gateway closed with fatal code 4004: Authentication failed.".to_string())
    };
    let monitor_cancel = fixture.supervisor.token();
    let monitor_unit = async move { monitor.run(monitor_cancel).await };

    let report = fixture
        .supervisor
        .run(channel_unit, monitor_unit, std::future::pending())
        .await;

    assert_eq!(report.reason, ShutdownReason::ChannelExited);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].unit, "alert_channel");
    assert!(report.failures[0].error.contains("4004"));
    assert_eq!(*state.borrow(), MonitorState::Cancelled);
    assert!(fixture.channel.is_closed());
    assert!(fixture.checker.is_closed());
}

#[tokio::test(start_paused = true)]
async fn unit_ignoring_cancel_is_aborted_after_grace() {
    let fixture = fixture(true);

    let channel_unit = std::future::pending::<Result<(), String>>();
    let monitor_unit = async { Err::<(), _>("boom".to_string()) };

    let started = Instant::now();
    let report = fixture
        .supervisor
        .run(channel_unit, monitor_unit, std::future::pending())
        .await;

    assert!(started.elapsed() >= GRACE);
    assert_eq!(report.reason, ShutdownReason::MonitorExited);
    let units: Vec<&str> = report.failures.iter().map(|f| f.unit).collect();
    assert_eq!(units, ["monitor_loop", "alert_channel"]);
    assert!(report.failures[1].error.contains("did not stop"));
    assert!(fixture.channel.is_closed());
    assert!(fixture.checker.is_closed());
}

#[tokio::test(start_paused = true)]
async fn panicking_unit_is_reported() {
    let fixture = fixture(true);

    let channel_unit = until_cancelled(fixture.supervisor.token());
    let monitor_unit = exploding_unit();

    let report = fixture
        .supervisor
        .run(channel_unit, monitor_unit, std::future::pending())
        .await;

    assert_eq!(report.reason, ShutdownReason::MonitorExited);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].error, "panicked");
}
