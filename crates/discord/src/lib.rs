//! Discord notification channel for the liveness monitor.
//!
//! Two halves share one readiness signal:
//!
//! - [`DiscordGateway`] keeps a bot session open on the gateway
//!   WebSocket (hello, identify, heartbeat, reconnect with backoff) and
//!   flips readiness when `READY` arrives.
//! - [`DiscordChannel`] posts alert text through the REST API, refusing
//!   to send until the gateway is ready.

pub mod api;
pub mod channel;
pub mod client;
pub mod gateway;
pub mod messages;
pub mod reconnect;
pub mod session;

pub use api::DiscordApi;
pub use channel::DiscordChannel;
pub use client::GatewayClient;
pub use gateway::{DiscordGateway, GatewayError};
pub use reconnect::ReconnectConfig;
