//! Socket.IO v5 over Engine.IO v4 text framing.
//!
//! Only the default namespace and text packets are supported:
//!
//! | frame              | meaning                      |
//! |--------------------|------------------------------|
//! | `0{...}`           | engine open handshake        |
//! | `2` / `3`          | ping / pong                  |
//! | `40{...}`          | namespace connect (+ auth)   |
//! | `41`               | namespace disconnect         |
//! | `42["name",{...}]` | event                        |
//! | `44{...}`          | connect error                |

use serde::Deserialize;
use serde_json::Value;

use crate::errors::{ChatError, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(OpenInfo),
    Close,
    Ping,
    Pong,
    Noop,
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, payload: Value },
    ConnectError(Value),
}

impl Packet {
    pub fn event(name: &str, payload: Value) -> Self {
        Packet::Event {
            name: name.to_string(),
            payload,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Packet::Open(info) => format!(
                "0{}",
                serde_json::json!({
                    "sid": info.sid,
                    "pingInterval": info.ping_interval,
                    "pingTimeout": info.ping_timeout,
                })
            ),
            Packet::Close => "1".to_string(),
            Packet::Ping => "2".to_string(),
            Packet::Pong => "3".to_string(),
            Packet::Noop => "6".to_string(),
            Packet::Connect(None) => "40".to_string(),
            Packet::Connect(Some(auth)) => format!("40{auth}"),
            Packet::Disconnect => "41".to_string(),
            Packet::Event { name, payload } => {
                format!("42{}", Value::Array(vec![Value::String(name.clone()), payload.clone()]))
            }
            Packet::ConnectError(data) => format!("44{data}"),
        }
    }

    pub fn decode(frame: &str) -> Result<Packet> {
        let mut chars = frame.chars();
        let engine = chars
            .next()
            .ok_or_else(|| ChatError::Packet("empty frame".into()))?;
        let rest = chars.as_str();

        match engine {
            '0' => serde_json::from_str(rest)
                .map(Packet::Open)
                .map_err(|e| ChatError::decode("engine open packet", e)),
            '1' => Ok(Packet::Close),
            '2' => Ok(Packet::Ping),
            '3' => Ok(Packet::Pong),
            '6' => Ok(Packet::Noop),
            '4' => decode_socket(rest),
            other => Err(ChatError::Packet(format!("unsupported engine packet type '{other}'"))),
        }
    }
}

fn decode_socket(frame: &str) -> Result<Packet> {
    let mut chars = frame.chars();
    let kind = chars
        .next()
        .ok_or_else(|| ChatError::Packet("empty socket packet".into()))?;
    let body = strip_namespace_and_ack(chars.as_str());

    match kind {
        '0' if body.is_empty() => Ok(Packet::Connect(None)),
        '0' => serde_json::from_str(body)
            .map(|v| Packet::Connect(Some(v)))
            .map_err(|e| ChatError::decode("connect packet", e)),
        '1' => Ok(Packet::Disconnect),
        '2' => {
            let items: Vec<Value> =
                serde_json::from_str(body).map_err(|e| ChatError::decode("event packet", e))?;
            let mut items = items.into_iter();
            let name = match items.next() {
                Some(Value::String(name)) => name,
                _ => return Err(ChatError::Packet("event without a name".into())),
            };
            Ok(Packet::Event {
                name,
                payload: items.next().unwrap_or(Value::Null),
            })
        }
        '4' => serde_json::from_str(body)
            .map(Packet::ConnectError)
            .map_err(|e| ChatError::decode("connect error packet", e)),
        other => Err(ChatError::Packet(format!("unsupported socket packet type '{other}'"))),
    }
}

/// Drops a `/namespace,` prefix and a numeric ack id, leaving the JSON body.
fn strip_namespace_and_ack(body: &str) -> &str {
    let body = match body.strip_prefix('/') {
        Some(ns) => ns.split_once(',').map_or("", |(_, rest)| rest),
        None => body,
    };
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}
