//! Discord gateway payload types and parser.
//!
//! Every gateway frame is a JSON object of the shape
//! `{"op": <int>, "d": <any>, "s": <int|null>, "t": <string|null>}`.
//! Only the opcodes the monitor needs are modelled; everything else is
//! carried through as [`GatewayEvent::Other`].

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Gateway opcodes.
pub mod op {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// `GUILDS` intent. The monitor only sends messages, so it asks for the
/// minimum the gateway accepts.
pub const DEFAULT_INTENTS: u64 = 1;

/// Close codes after which reconnecting cannot succeed.
const FATAL_CLOSE_CODES: [u16; 6] = [4004, 4010, 4011, 4012, 4013, 4014];

/// Raw gateway frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    #[serde(default)]
    pub d: serde_json::Value,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

/// Payload of op 10.
#[derive(Debug, Clone, Deserialize)]
pub struct HelloData {
    /// Milliseconds between heartbeats.
    pub heartbeat_interval: u64,
}

/// Payload of the `READY` dispatch.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyData {
    pub session_id: String,
    pub user: ReadyUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadyUser {
    pub id: String,
    pub username: String,
}

/// Interpreted gateway frame.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Hello(HelloData),
    Ready(ReadyData),
    /// Any other dispatch (`t` is the event name).
    Dispatch { name: String },
    /// Server asks for an immediate heartbeat.
    HeartbeatRequest,
    HeartbeatAck,
    Reconnect,
    /// `d` tells whether the session could be resumed.
    InvalidSession { resumable: bool },
    Other { op: u8 },
}

/// A parsed frame together with its sequence number, if any.
#[derive(Debug, Clone)]
pub struct ParsedFrame {
    pub sequence: Option<u64>,
    pub event: GatewayEvent,
}

#[derive(Debug, thiserror::Error)]
#[error("Malformed gateway payload: {0}")]
pub struct ParseError(#[from] serde_json::Error);

/// Parse a text frame from the gateway.
pub fn parse_frame(text: &str) -> Result<ParsedFrame, ParseError> {
    let payload: GatewayPayload = serde_json::from_str(text)?;
    let event = match payload.op {
        op::HELLO => GatewayEvent::Hello(serde_json::from_value(payload.d)?),
        op::DISPATCH => match payload.t.as_deref() {
            Some("READY") => GatewayEvent::Ready(serde_json::from_value(payload.d)?),
            Some(name) => GatewayEvent::Dispatch {
                name: name.to_string(),
            },
            None => GatewayEvent::Dispatch {
                name: String::new(),
            },
        },
        op::HEARTBEAT => GatewayEvent::HeartbeatRequest,
        op::HEARTBEAT_ACK => GatewayEvent::HeartbeatAck,
        op::RECONNECT => GatewayEvent::Reconnect,
        op::INVALID_SESSION => GatewayEvent::InvalidSession {
            resumable: payload.d.as_bool().unwrap_or(false),
        },
        other => GatewayEvent::Other { op: other },
    };
    Ok(ParsedFrame {
        sequence: payload.s,
        event,
    })
}

/// Op 2 frame authenticating the bot.
pub fn identify(token: &str, intents: u64) -> String {
    json!({
        "op": op::IDENTIFY,
        "d": {
            "token": token,
            "intents": intents,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "ewatch",
                "device": "ewatch",
            },
        },
    })
    .to_string()
}

/// Op 1 frame carrying the last sequence number seen (or `null`).
pub fn heartbeat(sequence: Option<u64>) -> String {
    json!({ "op": op::HEARTBEAT, "d": sequence }).to_string()
}

/// Whether a close code means the credentials or configuration are wrong.
pub fn is_fatal_close_code(code: u16) -> bool {
    FATAL_CLOSE_CODES.contains(&code)
}
