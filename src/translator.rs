//! Bot reply translation
//!
//! Converts webhook replies into `ChatMessage`s and extracts handoff
//! directives. A batch containing any malformed reply (wrong shape, or no
//! recognized content) is rejected whole, so no partial output reaches the
//! pending queue.

use crate::backend::BackendReply;
use crate::message::{ChatMessage, MessagePayload};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Request to transfer the conversation to a human operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffDirective {
    pub endpoint: String,
    pub title: Option<String>,
}

impl HandoffDirective {
    /// Read a directive from a reply's `custom` field, if it carries one
    pub fn from_custom(custom: &Value) -> Option<Self> {
        let endpoint = custom.get("handoff_host")?.as_str()?;
        if endpoint.is_empty() {
            return None;
        }
        let title = custom
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        Some(Self {
            endpoint: endpoint.to_string(),
            title,
        })
    }
}

/// Output of translating one webhook response
#[derive(Debug, Clone, Default)]
pub struct Translation {
    pub messages: Vec<ChatMessage>,
    pub directives: Vec<HandoffDirective>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("reply {position} carries no recognized content")]
    MalformedReply { position: usize },
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

fn attachment_text(attachment: &Value) -> Option<String> {
    match attachment {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Translate a single reply. Returns `None` when no recognized field matched.
fn translate_reply(reply: &BackendReply, out: &mut Translation) -> Option<()> {
    let mut recognized = false;

    if let Some(text) = non_empty(reply.text.as_ref()) {
        recognized = true;
        out.messages
            .push(ChatMessage::bot(MessagePayload::text(text)));
    }

    for buttons in [&reply.buttons, &reply.quick_replies].into_iter().flatten() {
        recognized = true;
        out.messages.push(ChatMessage::bot(MessagePayload::Buttons {
            buttons: buttons.clone(),
        }));
    }

    if let Some(url) = non_empty(reply.image.as_ref()) {
        recognized = true;
        out.messages.push(ChatMessage::bot(MessagePayload::Image {
            url: url.to_string(),
        }));
    }

    if let Some(text) = reply.attachment.as_ref().and_then(attachment_text) {
        recognized = true;
        out.messages.push(ChatMessage::bot(MessagePayload::Text { text }));
    }

    match reply.custom.as_ref() {
        Some(Value::Null) | None => {}
        Some(custom) => {
            recognized = true;
            if let Some(directive) = HandoffDirective::from_custom(custom) {
                out.directives.push(directive);
            } else {
                out.messages.push(ChatMessage::bot(MessagePayload::Custom {
                    value: custom.clone(),
                }));
            }
        }
    }

    recognized.then_some(())
}

/// Translate an ordered batch of raw reply elements, preserving order.
pub fn translate(replies: &[Value]) -> Result<Translation, TranslateError> {
    let mut out = Translation::default();
    for (position, raw) in replies.iter().enumerate() {
        let reply = BackendReply::deserialize(raw).map_err(|e| {
            tracing::debug!(position, error = %e, "Reply element has the wrong shape");
            TranslateError::MalformedReply { position }
        })?;
        translate_reply(&reply, &mut out).ok_or(TranslateError::MalformedReply { position })?;
    }
    Ok(out)
}
