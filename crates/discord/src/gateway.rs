//! Long-lived gateway lifecycle: connect, run a session, reconnect.
//!
//! [`DiscordGateway::run`] is the unit of work the supervisor runs next
//! to the monitor loop. Readiness is published on a [`watch`] channel;
//! hand a receiver to [`crate::DiscordChannel`] so deliveries are held
//! back until the bot is connected.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::client::GatewayClient;
use crate::reconnect::{pause, reconnect_loop, ReconnectConfig};
use crate::session::{run_session, SessionEnd};

/// Errors that end the gateway lifecycle for good.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Discord closed the session with a code that rules out
    /// reconnecting (bad token, disallowed intents, ...).
    #[error("Gateway closed with fatal code {code}: {reason}")]
    Fatal { code: u16, reason: String },
}

/// Owns the gateway connection and its readiness signal.
pub struct DiscordGateway {
    client: GatewayClient,
    reconnect: ReconnectConfig,
    ready_tx: watch::Sender<bool>,
}

impl DiscordGateway {
    pub fn new(client: GatewayClient, reconnect: ReconnectConfig) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            client,
            reconnect,
            ready_tx,
        }
    }

    /// Receiver that flips to `true` once the bot is identified and back
    /// to `false` whenever the session drops.
    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Keep a gateway session alive until `cancel` fires.
    ///
    /// Returns `Ok(())` on cancellation and `Err` only for fatal close
    /// codes; every other failure is retried with backoff.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), GatewayError> {
        tracing::info!(url = %self.client.gateway_url(), "Starting Discord gateway");

        loop {
            let mut ws = match reconnect_loop(&self.client, &self.reconnect, &cancel).await {
                Some(ws) => ws,
                None => break,
            };

            let end = run_session(
                &mut ws,
                self.client.token(),
                self.client.intents(),
                &self.ready_tx,
                &cancel,
            )
            .await;
            self.ready_tx.send_replace(false);

            match end {
                SessionEnd::Cancelled => break,
                SessionEnd::Fatal { code, reason } => {
                    tracing::error!(code, reason = %reason, "Discord gateway closed, not reconnecting");
                    return Err(GatewayError::Fatal { code, reason });
                }
                SessionEnd::Reconnect(reason) => {
                    tracing::warn!(reason = %reason, "Discord gateway session ended, reconnecting");
                    if !pause(self.reconnect.initial_delay, &cancel).await {
                        break;
                    }
                }
            }
        }

        self.ready_tx.send_replace(false);
        tracing::info!("Discord gateway stopped");
        Ok(())
    }
}
