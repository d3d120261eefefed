//! Exponential-backoff reconnection to the Discord gateway.
//!
//! When the gateway connection drops, the lifecycle task calls
//! [`reconnect_loop`] to keep retrying with increasing delays until
//! either the connection is restored or the [`CancellationToken`] is
//! triggered.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{GatewayClient, WsStream};

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Sleep for `delay` unless cancelled first.
///
/// Returns `false` if the token fired.
pub async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Connect to the gateway, retrying with exponential backoff.
///
/// The first attempt is made immediately. Returns `Some(stream)` once a
/// connection succeeds, or `None` if `cancel` is triggered first.
pub async fn reconnect_loop(
    client: &GatewayClient,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<WsStream> {
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Gateway reconnect cancelled");
                return None;
            }
            result = client.connect() => {
                match result {
                    Ok(stream) => {
                        if attempt > 1 {
                            tracing::info!(attempt, "Reconnected to Discord gateway");
                        }
                        return Some(stream);
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            delay_ms = delay.as_millis() as u64,
                            "Gateway connect attempt {attempt} failed",
                        );
                    }
                }
            }
        }

        if !pause(delay, cancel).await {
            return None;
        }

        delay = next_delay(delay, config);
    }
}
