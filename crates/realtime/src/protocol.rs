//! Realtime wire frames and parser.
//!
//! Every frame is a JSON object of the shape `{"event": "<tag>", "data": ...}`.
//! Inbound frames are parsed into [`InboundFrame`]; outbound commands are
//! serialized from [`OutboundFrame`].

use campus_core::events::{EventKind, EVENT_CONNECT_ERROR, EVENT_ERROR, EVENT_PONG};
use serde::{Deserialize, Serialize};

/// Envelope shared by all inbound frames.
#[derive(Debug, Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// A parsed inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// A subscribable application event with its raw payload.
    Event {
        kind: EventKind,
        data: serde_json::Value,
    },
    /// The server reported a connection or authentication error.
    Error { message: String },
    /// Reply to a liveness ping.
    Pong,
    /// A well-formed frame with a tag this client does not handle.
    Unknown { event: String },
}

/// Commands sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum OutboundFrame {
    /// Liveness signal. No response contract.
    #[serde(rename = "ping")]
    Ping,

    /// Mark a notification as read.
    #[serde(rename = "notification:read")]
    MarkRead {
        #[serde(rename = "notificationId")]
        notification_id: String,
    },
}

/// Parse a realtime text frame.
///
/// Returns `Err` only for malformed JSON or a missing `event` tag; unknown
/// tags parse as [`InboundFrame::Unknown`].
pub fn parse_frame(text: &str) -> Result<InboundFrame, serde_json::Error> {
    let raw: RawFrame = serde_json::from_str(text)?;

    let frame = if let Some(kind) = EventKind::from_tag(&raw.event) {
        InboundFrame::Event {
            kind,
            data: raw.data,
        }
    } else if raw.event == EVENT_CONNECT_ERROR || raw.event == EVENT_ERROR {
        InboundFrame::Error {
            message: error_message(&raw.data),
        }
    } else if raw.event == EVENT_PONG {
        InboundFrame::Pong
    } else {
        InboundFrame::Unknown { event: raw.event }
    };

    Ok(frame)
}

/// Pull a human-readable message out of an error payload.
///
/// Accepts a bare string, an object with a `message` or `error` string,
/// and falls back to the JSON text of anything else.
pub fn error_message(data: &serde_json::Value) -> String {
    match data {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| data.to_string()),
        other => other.to_string(),
    }
}

/// Extract an error message from an HTTP response body returned by a
/// rejected WebSocket handshake.
///
/// JSON bodies are read with [`error_message`]; other bodies are used
/// verbatim. Empty bodies yield `None`.
pub fn error_message_from_body(body: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => Some(error_message(&value)),
        Err(_) => Some(text.to_string()),
    }
}
