//! Engine.IO v4 / Socket.IO v4 text packet codec.
//!
//! Only text frames on the default namespace are supported. A Socket.IO
//! packet rides inside an Engine.IO `message` packet, so an event on the wire
//! reads `42["name",payload]`.

use maira_core::LinkError;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Socket.IO CONNECT for the default namespace.
pub const CONNECT: &str = "40";
/// Socket.IO DISCONNECT for the default namespace.
pub const DISCONNECT: &str = "41";
/// Engine.IO ping.
pub const PING: &str = "2";
/// Engine.IO pong.
pub const PONG: &str = "3";

/// Errors produced while decoding or encoding a frame.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame carried no packet type.
    #[error("empty frame")]
    Empty,
    /// Unknown Engine.IO or Socket.IO packet type.
    #[error("unknown packet type '{0}'")]
    UnknownPacketType(char),
    /// An EVENT packet without a string event name.
    #[error("event packet without a name")]
    MissingEventName,
    /// Invalid JSON body.
    #[error("invalid packet body: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<CodecError> for LinkError {
    fn from(e: CodecError) -> Self {
        Self::Codec(e.to_string())
    }
}

/// Engine.IO `open` handshake body.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Engine.IO session ID.
    pub sid: String,
    /// Transports the server would upgrade to.
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Server ping interval, milliseconds.
    pub ping_interval: u64,
    /// Grace period after a missed ping, milliseconds.
    pub ping_timeout: u64,
    /// Largest payload the server accepts, bytes.
    #[serde(default)]
    pub max_payload: Option<u64>,
}

/// A decoded Engine.IO packet.
#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
    /// `0`: handshake.
    Open(Handshake),
    /// `1`: the server is closing the transport.
    Close,
    /// `2`: liveness probe; must be answered with a pong carrying the same data.
    Ping(String),
    /// `3`: probe answer.
    Pong(String),
    /// `4`: a Socket.IO packet.
    Message(SocketPacket),
    /// `5`: transport upgrade (unused over a plain WebSocket).
    Upgrade,
    /// `6`: no-op.
    Noop,
}

/// A decoded Socket.IO packet (namespace prefix stripped).
#[derive(Clone, Debug, PartialEq)]
pub enum SocketPacket {
    /// `0`: namespace joined.
    Connect {
        /// Socket ID assigned by the server.
        sid: Option<String>,
    },
    /// `1`: the server left the namespace.
    Disconnect,
    /// `2`: a named event; only the first argument is kept.
    Event {
        /// Event name.
        name: String,
        /// First argument, `Null` if none.
        payload: Value,
        /// Acknowledgement ID requested by the sender.
        ack: Option<u64>,
    },
    /// `4`: the server refused the namespace join.
    ConnectError {
        /// Refusal reason.
        message: String,
    },
    /// `3` (ACK) and `5`/`6` (binary), not supported here.
    Unsupported(char),
}

/// Decode one text frame.
pub fn decode(frame: &str) -> Result<Packet, CodecError> {
    let (kind, rest) = split_type(frame)?;
    Ok(match kind {
        '0' => Packet::Open(serde_json::from_str(rest)?),
        '1' => Packet::Close,
        '2' => Packet::Ping(rest.to_owned()),
        '3' => Packet::Pong(rest.to_owned()),
        '4' => Packet::Message(decode_socket(rest)?),
        '5' => Packet::Upgrade,
        '6' => Packet::Noop,
        other => return Err(CodecError::UnknownPacketType(other)),
    })
}

fn decode_socket(body: &str) -> Result<SocketPacket, CodecError> {
    let (kind, mut rest) = split_type(body)?;

    if rest.starts_with('/') {
        rest = rest.split_once(',').map_or("", |(_, after)| after);
    }

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let ack = rest[..digits].parse::<u64>().ok();
    rest = &rest[digits..];

    Ok(match kind {
        '0' => {
            let sid = if rest.is_empty() {
                None
            } else {
                let body: Value = serde_json::from_str(rest)?;
                body.get("sid").and_then(Value::as_str).map(str::to_owned)
            };
            SocketPacket::Connect { sid }
        }
        '1' => SocketPacket::Disconnect,
        '2' => {
            let args: Vec<Value> = serde_json::from_str(rest)?;
            let mut args = args.into_iter();
            let Some(Value::String(name)) = args.next() else {
                return Err(CodecError::MissingEventName);
            };
            SocketPacket::Event {
                name,
                payload: args.next().unwrap_or(Value::Null),
                ack,
            }
        }
        '4' => {
            let body: Value = if rest.is_empty() {
                Value::Null
            } else {
                serde_json::from_str(rest)?
            };
            let message = match &body {
                Value::String(s) => s.clone(),
                other => other
                    .get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| other.to_string(), str::to_owned),
            };
            SocketPacket::ConnectError { message }
        }
        '3' | '5' | '6' => SocketPacket::Unsupported(kind),
        other => return Err(CodecError::UnknownPacketType(other)),
    })
}

fn split_type(frame: &str) -> Result<(char, &str), CodecError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or(CodecError::Empty)?;
    Ok((kind, chars.as_str()))
}

/// Encode a named event with a single argument.
pub fn encode_event(name: &str, payload: &Value) -> Result<String, CodecError> {
    let body = serde_json::to_string(&(name, payload))?;
    Ok(format!("42{body}"))
}

/// Encode the pong answering an Engine.IO ping.
#[must_use]
pub fn encode_pong(data: &str) -> String {
    format!("{PONG}{data}")
}
