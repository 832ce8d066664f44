//! Events that can occur in a session

use super::state::HandoffStatus;
use crate::message::{creation_time, ChatMessage};
use crate::translator::{TranslateError, Translation};
use chrono::{DateTime, Utc};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserMessage {
        text: String,
        message_id: String,
        timestamp: DateTime<Utc>,
    },

    // Backend events
    BotReplies {
        translation: Translation,
    },
    ReplyRejected {
        error: TranslateError,
    },
    BackendFailed {
        message: String,
    },

    // Timer events
    DisplayTick,
    WaitTimeout {
        generation: u64,
    },

    // Handoff events
    AgentMessages {
        generation: u64,
        messages: Vec<ChatMessage>,
    },
    HandoffStatus {
        generation: u64,
        status: HandoffStatus,
    },

    Teardown,
}

impl Event {
    pub fn user_message(text: impl Into<String>) -> Self {
        Event::UserMessage {
            text: text.into(),
            message_id: uuid::Uuid::new_v4().to_string(),
            timestamp: creation_time(),
        }
    }
}
