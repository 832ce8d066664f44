//! Displayable chat entries
//!
//! A `ChatMessage` is immutable once created. Display order is by timestamp,
//! with the id breaking ties and de-duplicating.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    Bot,
    User,
}

/// A quick-reply button offered by the bot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    #[serde(alias = "title")]
    pub label: String,
    pub payload: String,
}

/// Typed content of a chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePayload {
    Text { text: String },
    Image { url: String },
    Buttons { buttons: Vec<Button> },
    Custom { value: Value },
}

impl MessagePayload {
    pub fn text(text: impl Into<String>) -> Self {
        MessagePayload::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessagePayload::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub author: Author,
    pub timestamp: DateTime<Utc>,
    pub payload: MessagePayload,
}

impl ChatMessage {
    pub fn new(author: Author, payload: MessagePayload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            author,
            timestamp: creation_time(),
            payload,
        }
    }

    pub fn bot(payload: MessagePayload) -> Self {
        Self::new(Author::Bot, payload)
    }
}

static LAST_CREATION_NANOS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Wall-clock time, strictly increasing across calls in this process, so
/// messages created in one batch keep their creation order on display.
pub fn creation_time() -> DateTime<Utc> {
    let now = Utc::now();
    let Some(nanos) = now.timestamp_nanos_opt() else {
        return now;
    };
    let previous = LAST_CREATION_NANOS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(nanos.max(last.saturating_add(1)))
        })
        .unwrap_or_else(|last| last);
    DateTime::from_timestamp_nanos(nanos.max(previous.saturating_add(1)))
}

/// Sort messages for display: timestamp ascending, id as tie-breaker,
/// later duplicates of an id dropped.
pub fn display_order(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut seen = HashSet::new();
    let mut ordered: Vec<ChatMessage> = messages
        .iter()
        .filter(|m| seen.insert(m.id.as_str()))
        .cloned()
        .collect();
    ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    ordered
}
