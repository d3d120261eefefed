//! [`AlertChannel`] implementation that posts to one Discord channel.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use ewatch_core::{AlertChannel, DeliveryError};
use tokio::sync::watch;

use crate::api::{DiscordApi, DiscordApiError};

/// Delivers alerts to a fixed channel once the gateway reports ready.
pub struct DiscordChannel {
    api: DiscordApi,
    channel_id: u64,
    ready: watch::Receiver<bool>,
    closed: AtomicBool,
}

impl DiscordChannel {
    /// `ready` comes from [`crate::DiscordGateway::subscribe_ready`].
    pub fn new(api: DiscordApi, channel_id: u64, ready: watch::Receiver<bool>) -> Self {
        Self {
            api,
            channel_id,
            ready,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl AlertChannel for DiscordChannel {
    fn is_ready(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && *self.ready.borrow()
    }

    async fn wait_ready(&self) -> Result<(), DeliveryError> {
        let mut ready = self.ready.clone();
        ready
            .wait_for(|is_ready| *is_ready)
            .await
            .map(|_| ())
            .map_err(|_| DeliveryError::Closed)
    }

    async fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DeliveryError::Closed);
        }
        if !self.is_ready() {
            return Err(DeliveryError::NotReady);
        }

        match self.api.create_message(self.channel_id, message).await {
            Ok(created) => {
                tracing::info!(
                    channel_id = self.channel_id,
                    message_id = ?created.map(|c| c.id),
                    "Alert sent successfully",
                );
                Ok(())
            }
            Err(DiscordApiError::ChannelNotFound(id)) => Err(DeliveryError::ChannelNotFound(id)),
            Err(DiscordApiError::ApiError { status, body }) => {
                Err(DeliveryError::Rejected { status, body })
            }
            Err(DiscordApiError::Request(e)) => Err(DeliveryError::Transport(e.to_string())),
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        tracing::info!(channel_id = self.channel_id, "Discord alert channel closed");
    }
}
