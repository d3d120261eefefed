//! In-memory collaborators for driving the monitor without Postgres or Discord.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ewatch_core::types::Timestamp;
use ewatch_core::{AlertChannel, DeliveryError, DeviceGroup, FreshnessChecker, FreshnessWindow};
use tokio::sync::watch;
use tokio::time::Instant;

/// Ordered record of collaborator calls shared by both fakes.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// FreshnessChecker
// ---------------------------------------------------------------------------

/// What a scripted check does.
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Fresh(bool),
    Panic,
    Hang,
}

/// Plays back per-group outcomes, then falls back to a fixed answer.
pub struct ScriptedChecker {
    scripts: Mutex<HashMap<String, VecDeque<Outcome>>>,
    fallback: bool,
    calls: Mutex<Vec<(String, Instant)>>,
    call_count: watch::Sender<usize>,
    journal: Journal,
    closed: AtomicBool,
}

impl ScriptedChecker {
    pub fn new(fallback: bool, journal: Journal) -> Self {
        let (call_count, _) = watch::channel(0);
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback,
            calls: Mutex::new(Vec::new()),
            call_count,
            journal,
            closed: AtomicBool::new(false),
        }
    }

    pub fn script(self, label: &str, outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(label.to_string(), outcomes.into_iter().collect());
        self
    }

    pub fn script_fresh(self, label: &str, results: &[bool]) -> Self {
        self.script(label, results.iter().copied().map(Outcome::Fresh))
    }

    /// Resolve once at least `n` checks have started.
    pub async fn wait_calls(&self, n: usize) {
        let mut rx = self.call_count.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.borrow()
    }

    /// Times at which `label` was checked.
    pub fn call_times(&self, label: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| l == label)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FreshnessChecker for ScriptedChecker {
    async fn has_recent_record(
        &self,
        group: &DeviceGroup,
        _window: FreshnessWindow,
        _now: Timestamp,
    ) -> bool {
        let label = group.label().to_string();
        let outcome = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&label)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Outcome::Fresh(self.fallback));

        self.calls.lock().unwrap().push((label.clone(), Instant::now()));
        self.journal.push(format!("check {label}"));
        self.call_count.send_modify(|count| *count += 1);

        match outcome {
            Outcome::Fresh(is_fresh) => is_fresh,
            Outcome::Panic => panic!("scripted checker panic for {label}"),
            Outcome::Hang => std::future::pending().await,
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// AlertChannel
// ---------------------------------------------------------------------------

/// Records delivered messages; readiness and failures are set by the test.
pub struct RecordingChannel {
    ready: watch::Sender<bool>,
    refuse_ready: AtomicBool,
    panic_on_deliver: AtomicBool,
    failure: Mutex<Option<DeliveryError>>,
    delivered: Mutex<Vec<String>>,
    attempts: watch::Sender<usize>,
    journal: Journal,
    closed: AtomicBool,
}

impl RecordingChannel {
    pub fn new(ready: bool, journal: Journal) -> Self {
        let (ready, _) = watch::channel(ready);
        let (attempts, _) = watch::channel(0);
        Self {
            ready,
            refuse_ready: AtomicBool::new(false),
            panic_on_deliver: AtomicBool::new(false),
            failure: Mutex::new(None),
            delivered: Mutex::new(Vec::new()),
            attempts,
            journal,
            closed: AtomicBool::new(false),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.send_replace(ready);
    }

    /// Make `wait_ready` fail as if the connection went away.
    pub fn refuse_ready(&self) {
        self.refuse_ready.store(true, Ordering::SeqCst);
    }

    /// Every subsequent delivery panics.
    pub fn panic_on_deliver(&self) {
        self.panic_on_deliver.store(true, Ordering::SeqCst);
    }

    /// Every subsequent delivery fails with `error`.
    pub fn fail_with(&self, error: DeliveryError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.borrow()
    }

    /// Resolve once at least `n` deliveries were attempted.
    pub async fn wait_attempts(&self, n: usize) {
        let mut rx = self.attempts.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertChannel for RecordingChannel {
    fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    async fn wait_ready(&self) -> Result<(), DeliveryError> {
        if self.refuse_ready.load(Ordering::SeqCst) {
            return Err(DeliveryError::Closed);
        }
        let mut rx = self.ready.subscribe();
        rx.wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|_| DeliveryError::Closed)
    }

    async fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
        self.attempts.send_modify(|count| *count += 1);

        if !*self.ready.borrow() {
            return Err(DeliveryError::NotReady);
        }
        if self.panic_on_deliver.load(Ordering::SeqCst) {
            panic!("scripted delivery panic");
        }
        let failure = self.failure.lock().unwrap().clone();
        if let Some(error) = failure {
            return Err(error);
        }

        self.delivered.lock().unwrap().push(message.to_string());
        self.journal.push(format!("deliver {message}"));
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn groups() -> Vec<DeviceGroup> {
    vec![
        DeviceGroup::new("left", ["left-1", "left-2"]).unwrap(),
        DeviceGroup::new("right", ["right-1"]).unwrap(),
    ]
}
