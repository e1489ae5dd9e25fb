//! Socket.IO (protocol 5) over the Engine.IO 4 websocket transport.
//!
//! The backend speaks Socket.IO, so every websocket text frame starts with
//! an Engine.IO packet type digit. Message packets (`4`) wrap a Socket.IO
//! packet whose own type digit follows; events arrive as
//! `42["update_process",{...}]`. Only the default namespace is used.
//!
//! Engine.IO 4 has the server ping and the client answer with a pong echoing
//! the payload.

use crate::wire::{Command, FrameError, PushEvent};
use serde::Deserialize;
use serde_json::{json, Value};

pub const ENGINE_IO_VERSION: &str = "4";
pub const DEFAULT_PATH: &str = "/socket.io/";

/// Sent after the Engine.IO open packet to join the default namespace.
pub const CONNECT_PACKET: &str = "40";

/// Payload of the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong; the client uses the same
    /// grace on top of the interval before giving up on the link.
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Open(OpenHandshake),
    /// Engine.IO close; the transport is going away.
    Close,
    Ping(String),
    /// Namespace joined.
    Connected,
    /// Server-side namespace disconnect.
    Disconnected,
    ConnectError(String),
    Event(PushEvent),
    /// A well-formed packet this client has no use for (noop, upgrade, acks,
    /// binary events, events it does not know).
    Ignored(String),
}

pub fn pong(payload: &str) -> String {
    format!("3{payload}")
}

pub fn decode_packet(text: &str, max_frame_bytes: usize) -> Result<Inbound, FrameError> {
    if text.len() > max_frame_bytes {
        return Err(FrameError::Oversized {
            size: text.len(),
            max: max_frame_bytes,
        });
    }
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| FrameError::Decode("empty engine.io packet".to_string()))?;
    let body = chars.as_str();
    match kind {
        '0' => serde_json::from_str(body)
            .map(Inbound::Open)
            .map_err(|err| FrameError::Decode(format!("open handshake: {err}"))),
        '1' => Ok(Inbound::Close),
        '2' => Ok(Inbound::Ping(body.to_string())),
        '3' | '5' | '6' => Ok(Inbound::Ignored(text.to_string())),
        '4' => decode_socket_packet(body),
        other => Err(FrameError::Decode(format!(
            "unknown engine.io packet type {other:?}"
        ))),
    }
}

fn decode_socket_packet(body: &str) -> Result<Inbound, FrameError> {
    let mut chars = body.chars();
    let kind = chars
        .next()
        .ok_or_else(|| FrameError::Decode("empty socket.io packet".to_string()))?;
    let rest = skip_namespace(chars.as_str());
    match kind {
        '0' => Ok(Inbound::Connected),
        '1' => Ok(Inbound::Disconnected),
        '2' => decode_event(skip_ack_id(rest)),
        '4' => Ok(Inbound::ConnectError(connect_error_message(rest))),
        '3' | '5' | '6' => Ok(Inbound::Ignored(format!("4{body}"))),
        other => Err(FrameError::Decode(format!(
            "unknown socket.io packet type {other:?}"
        ))),
    }
}

fn skip_namespace(rest: &str) -> &str {
    if rest.starts_with('/') {
        match rest.find(',') {
            Some(comma) => &rest[comma + 1..],
            None => "",
        }
    } else {
        rest
    }
}

fn skip_ack_id(rest: &str) -> &str {
    rest.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn connect_error_message(rest: &str) -> String {
    match serde_json::from_str::<Value>(rest) {
        Ok(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| rest.to_string()),
        _ => rest.to_string(),
    }
}

fn decode_event(payload: &str) -> Result<Inbound, FrameError> {
    let args: Vec<Value> =
        serde_json::from_str(payload).map_err(|err| FrameError::Decode(err.to_string()))?;
    let mut args = args.into_iter();
    let name = match args.next() {
        Some(Value::String(name)) => name,
        _ => return Err(FrameError::Decode("event without a name".to_string())),
    };
    if !matches!(name.as_str(), "update_process" | "finalize_process" | "reset_ui") {
        return Ok(Inbound::Ignored(name));
    }
    let envelope = match args.next() {
        Some(data) if !data.is_null() => json!({ "event": name, "data": data }),
        _ => json!({ "event": name }),
    };
    serde_json::from_value(envelope)
        .map(Inbound::Event)
        .map_err(|err| FrameError::Decode(err.to_string()))
}

/// Encodes a command as a Socket.IO event packet: `42["start_process",{"id":3}]`,
/// or `42["add_process"]` for commands without arguments.
pub fn encode_event(command: &Command, max_frame_bytes: usize) -> Result<String, FrameError> {
    let envelope = serde_json::to_value(command).map_err(|err| FrameError::Encode(err.to_string()))?;
    let mut args = vec![Value::String(command.name().to_string())];
    if let Some(data) = envelope.get("data") {
        args.push(data.clone());
    }
    let body = serde_json::to_string(&args).map_err(|err| FrameError::Encode(err.to_string()))?;
    let packet = format!("42{body}");
    if packet.len() > max_frame_bytes {
        return Err(FrameError::Oversized {
            size: packet.len(),
            max: max_frame_bytes,
        });
    }
    Ok(packet)
}
