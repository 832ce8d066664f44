//! Realtime channel frames
//!
//! Outbound subscribe frames and classification of inbound envelopes. Frame
//! handling never mutates session state; it only yields messages to enqueue.

use super::HandoffSession;
use crate::message::{ChatMessage, MessagePayload};
use serde::Deserialize;
use serde_json::{json, Value};

pub const ROOM_CHANNEL: &str = "RoomChannel";
pub const MESSAGE_CREATED: &str = "message.created";
/// `message_type` of messages written by a human agent
pub const AGENT_MESSAGE_TYPE: i64 = 1;

/// Subscribe control frame. The identifier is itself a JSON-encoded string.
pub fn subscribe_frame(pubsub_token: &str) -> String {
    let identifier = json!({
        "channel": ROOM_CHANNEL,
        "pubsub_token": pubsub_token,
    })
    .to_string();
    json!({
        "command": "subscribe",
        "identifier": identifier,
    })
    .to_string()
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct EventMessage {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct MessageData {
    message_type: Option<i64>,
    content: Option<String>,
}

/// Classified inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Ping,
    /// Channel control frames (`welcome`, `confirm_subscription`, ...)
    Control(String),
    AgentMessage(String),
    /// Well-formed but irrelevant to the user (other event types, non-agent authors)
    Ignored(String),
}

pub fn parse_frame(raw: &str) -> Result<Frame, serde_json::Error> {
    let envelope: Envelope = serde_json::from_str(raw)?;

    match (envelope.kind.as_deref(), envelope.message) {
        (Some("ping"), _) => Ok(Frame::Ping),
        (Some(kind), _) => Ok(Frame::Control(kind.to_string())),
        (None, Some(message)) => parse_event(message),
        (None, None) => Ok(Frame::Ignored("envelope without type or message".into())),
    }
}

fn parse_event(message: Value) -> Result<Frame, serde_json::Error> {
    let event: EventMessage = serde_json::from_value(message)?;
    if event.event != MESSAGE_CREATED {
        return Ok(Frame::Ignored(format!("event {}", event.event)));
    }
    let data: MessageData = serde_json::from_value(event.data)?;
    Ok(match (data.message_type, data.content) {
        (Some(AGENT_MESSAGE_TYPE), Some(content)) if !content.is_empty() => {
            Frame::AgentMessage(content)
        }
        (Some(AGENT_MESSAGE_TYPE), _) => Frame::Ignored("agent message without content".into()),
        (kind, _) => Frame::Ignored(format!("message_type {kind:?}")),
    })
}

/// Translate one inbound frame into messages to enqueue
pub fn handle_frame(session: &HandoffSession, raw: &str) -> Vec<ChatMessage> {
    match parse_frame(raw) {
        Ok(Frame::AgentMessage(content)) => {
            tracing::info!(conversation_id = %session.conversation_id, "New message from agent");
            vec![ChatMessage::bot(MessagePayload::Text { text: content })]
        }
        Ok(Frame::Ping) => Vec::new(),
        Ok(Frame::Control(kind)) => {
            tracing::debug!(conversation_id = %session.conversation_id, kind = %kind, "Realtime control frame");
            Vec::new()
        }
        Ok(Frame::Ignored(reason)) => {
            tracing::debug!(conversation_id = %session.conversation_id, reason = %reason, "Discarding realtime event");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(conversation_id = %session.conversation_id, error = %e, frame = %raw, "Malformed realtime frame");
            Vec::new()
        }
    }
}
