//! One gateway session: hello, identify, heartbeat, ready.
//!
//! [`run_session`] drives a freshly opened gateway WebSocket until it
//! ends, publishing readiness on a [`watch`] channel when the `READY`
//! dispatch arrives. The caller decides what to do with the returned
//! [`SessionEnd`].

use std::borrow::Cow;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::WsStream;
use crate::messages::{self, parse_frame, GatewayEvent, HelloData};

/// How long to wait for op 10 after the socket opens.
const HELLO_TIMEOUT: Duration = Duration::from_secs(30);

/// How a session finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The cancellation token fired; a close frame was sent.
    Cancelled,
    /// The session dropped for a reason a fresh connection may fix.
    Reconnect(String),
    /// Discord closed with a code that rules out reconnecting.
    Fatal { code: u16, reason: String },
}

/// Drive one gateway session to completion.
///
/// `ready` is set to `true` when `READY` arrives. It is left untouched
/// on exit; the lifecycle task resets it.
pub async fn run_session(
    ws: &mut WsStream,
    token: &str,
    intents: u64,
    ready: &watch::Sender<bool>,
    cancel: &CancellationToken,
) -> SessionEnd {
    let hello = tokio::select! {
        _ = cancel.cancelled() => return close_for_shutdown(ws).await,
        hello = wait_for_hello(ws) => hello,
    };
    let hello = match hello {
        Ok(hello) => hello,
        Err(end) => return end,
    };

    let heartbeat_every = Duration::from_millis(hello.heartbeat_interval.max(1));
    tracing::debug!(
        heartbeat_ms = hello.heartbeat_interval,
        "Gateway hello received"
    );

    if let Err(e) = ws.send(Message::Text(messages::identify(token, intents))).await {
        return SessionEnd::Reconnect(format!("failed to send identify: {e}"));
    }

    let mut sequence: Option<u64> = None;
    let mut ack_pending = false;
    let mut ticker = interval_at(Instant::now() + heartbeat_every, heartbeat_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                return close_for_shutdown(ws).await;
            }
            _ = ticker.tick() => {
                if ack_pending {
                    return SessionEnd::Reconnect("heartbeat was not acknowledged".into());
                }
                if let Err(e) = ws.send(Message::Text(messages::heartbeat(sequence))).await {
                    return SessionEnd::Reconnect(format!("failed to send heartbeat: {e}"));
                }
                ack_pending = true;
            }
            msg = ws.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(frame))) => return classify_close(frame),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        return SessionEnd::Reconnect(format!("gateway receive error: {e}"));
                    }
                    None => return SessionEnd::Reconnect("gateway stream ended".into()),
                };

                let frame = match parse_frame(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(error = %e, raw_message = %text, "Ignoring gateway frame");
                        continue;
                    }
                };
                if frame.sequence.is_some() {
                    sequence = frame.sequence;
                }

                match frame.event {
                    GatewayEvent::Ready(data) => {
                        tracing::info!(
                            user = %data.user.username,
                            user_id = %data.user.id,
                            "Bot connected as {}",
                            data.user.username,
                        );
                        ready.send_replace(true);
                    }
                    GatewayEvent::HeartbeatAck => ack_pending = false,
                    GatewayEvent::HeartbeatRequest => {
                        if let Err(e) = ws.send(Message::Text(messages::heartbeat(sequence))).await {
                            return SessionEnd::Reconnect(format!("failed to send heartbeat: {e}"));
                        }
                    }
                    GatewayEvent::Reconnect => {
                        return SessionEnd::Reconnect("gateway requested reconnect".into());
                    }
                    GatewayEvent::InvalidSession { resumable } => {
                        return SessionEnd::Reconnect(format!(
                            "invalid session (resumable: {resumable})"
                        ));
                    }
                    GatewayEvent::Dispatch { name } => {
                        tracing::trace!(event = %name, "Gateway dispatch");
                    }
                    GatewayEvent::Hello(_) | GatewayEvent::Other { .. } => {}
                }
            }
        }
    }
}

/// Read frames until op 10 arrives.
async fn wait_for_hello(ws: &mut WsStream) -> Result<HelloData, SessionEnd> {
    let read = async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(text)) => match parse_frame(&text) {
                    Ok(frame) => {
                        if let GatewayEvent::Hello(hello) = frame.event {
                            return Ok(hello);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, raw_message = %text, "Ignoring gateway frame");
                    }
                },
                Ok(Message::Close(frame)) => return Err(classify_close(frame)),
                Ok(_) => {}
                Err(e) => {
                    return Err(SessionEnd::Reconnect(format!(
                        "gateway receive error: {e}"
                    )))
                }
            }
        }
        Err(SessionEnd::Reconnect(
            "gateway stream ended before hello".into(),
        ))
    };

    match tokio::time::timeout(HELLO_TIMEOUT, read).await {
        Ok(result) => result,
        Err(_) => Err(SessionEnd::Reconnect("timed out waiting for hello".into())),
    }
}

fn classify_close(frame: Option<CloseFrame<'_>>) -> SessionEnd {
    let (code, reason) = match frame {
        Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
        None => (1005, String::new()),
    };

    if messages::is_fatal_close_code(code) {
        SessionEnd::Fatal { code, reason }
    } else {
        SessionEnd::Reconnect(format!("gateway closed ({code}): {reason}"))
    }
}

async fn close_for_shutdown(ws: &mut WsStream) -> SessionEnd {
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: Cow::Borrowed("shutting down"),
    };
    if let Err(e) = ws.close(Some(frame)).await {
        tracing::debug!(error = %e, "Gateway close handshake failed");
    }
    SessionEnd::Cancelled
}
