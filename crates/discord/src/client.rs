//! WebSocket client for the Discord gateway.
//!
//! [`GatewayClient`] holds what is needed to open a gateway session.
//! Call [`GatewayClient::connect`] to establish a live [`WsStream`];
//! the handshake itself (hello, identify, ready) is driven by
//! [`crate::session`].

use tokio_tungstenite::{connect_async, MaybeTlsStream};

/// Public gateway endpoint pinned to API v10 with JSON encoding.
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// A raw gateway WebSocket.
pub type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection settings for the bot's gateway session.
pub struct GatewayClient {
    gateway_url: String,
    token: String,
    intents: u64,
}

impl GatewayClient {
    /// * `gateway_url` - WebSocket URL, e.g. [`DEFAULT_GATEWAY_URL`].
    /// * `token`       - bot token sent in the identify payload.
    /// * `intents`     - gateway intents bitfield.
    pub fn new(gateway_url: String, token: String, intents: u64) -> Self {
        Self {
            gateway_url,
            token,
            intents,
        }
    }

    pub fn gateway_url(&self) -> &str {
        &self.gateway_url
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn intents(&self) -> u64 {
        self.intents
    }

    /// Open the gateway WebSocket.
    pub async fn connect(&self) -> Result<WsStream, GatewayClientError> {
        let (ws_stream, _response) = connect_async(self.gateway_url.as_str())
            .await
            .map_err(|e| {
                GatewayClientError::Connection(format!(
                    "Failed to connect to Discord gateway at {}: {e}",
                    self.gateway_url
                ))
            })?;

        tracing::info!(url = %self.gateway_url, "Connected to Discord gateway");
        Ok(ws_stream)
    }
}

/// Errors that can occur when opening the gateway WebSocket.
#[derive(Debug, thiserror::Error)]
pub enum GatewayClientError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}
