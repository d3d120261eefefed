//! Alert events raised when a device group stays silent, and the channel
//! they are delivered through.

use async_trait::async_trait;

/// Escalation produced when a group's failure streak reaches its threshold.
///
/// Constructed per alert and never retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    /// Label of the silent device group (e.g. `left`).
    pub group_label: String,
    /// Consecutive failures multiplied by the tick interval.
    pub elapsed_minutes: u64,
    /// Text delivered to the notification channel.
    pub message: String,
}

impl AlertEvent {
    pub fn new(group_label: &str, elapsed_minutes: u64) -> Self {
        Self {
            group_label: group_label.to_string(),
            elapsed_minutes,
            message: format!(
                "🚨 ALERT: No eGauge data received from the {group_label} Raspberry \
                 in the last {elapsed_minutes} minutes!"
            ),
        }
    }
}

/// Why a message could not be handed to the notification service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The channel has not completed its readiness handshake.
    #[error("Alert channel is not ready")]
    NotReady,

    /// The destination channel does not exist or is not visible.
    #[error("Could not find channel with ID {0}")]
    ChannelNotFound(u64),

    /// The service answered with a non-success status.
    #[error("Delivery rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Network, DNS, TLS or timeout failure.
    #[error("Delivery transport error: {0}")]
    Transport(String),

    /// The channel has been shut down.
    #[error("Alert channel is closed")]
    Closed,
}

/// Long-lived connection to a notification service.
///
/// The channel owns its own readiness lifecycle; callers wait for it
/// once with [`wait_ready`](Self::wait_ready) and then deliver messages.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Current readiness, without waiting.
    fn is_ready(&self) -> bool;

    /// Resolve once the channel is ready.
    ///
    /// Returns [`DeliveryError::Closed`] if the channel shuts down before
    /// ever becoming ready.
    async fn wait_ready(&self) -> Result<(), DeliveryError>;

    /// Send a single text message to the configured destination.
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError>;

    /// Close the connection. Called once during teardown.
    async fn close(&self) {}
}
