//! Session state types

use crate::commands::CommandFilter;
use crate::config::SessionConfig;
use crate::message::ChatMessage;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Progress of the live handoff, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HandoffStatus {
    #[default]
    Inactive,
    Connecting {
        endpoint: String,
    },
    Live {
        conversation_id: String,
    },
    Ended {
        reason: String,
    },
}

impl HandoffStatus {
    pub fn ended(reason: impl Into<String>) -> Self {
        HandoffStatus::Ended {
            reason: reason.into(),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, HandoffStatus::Connecting { .. } | HandoffStatus::Live { .. })
    }
}

/// The single response-wait timer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitTimer {
    #[default]
    Idle,
    Armed {
        generation: u64,
    },
}

/// Coarse controller state, derived from `SessionState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No outstanding request, queue empty
    Idle,
    /// Wait timer running, nothing queued yet
    AwaitingReply,
    /// Queued bot messages still being revealed
    Draining,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub visible: Vec<ChatMessage>,
    pub pending: VecDeque<ChatMessage>,
    pub wait: WaitTimer,
    pub wait_generation: u64,
    pub active_endpoint: String,
    pub active_title: String,
    pub handoff: HandoffStatus,
    pub handoff_generation: u64,
    pub last_error: Option<String>,
    pub closed: bool,
}

impl SessionState {
    pub fn new(endpoint: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            visible: Vec::new(),
            pending: VecDeque::new(),
            wait: WaitTimer::Idle,
            wait_generation: 0,
            active_endpoint: endpoint.into(),
            active_title: title.into(),
            handoff: HandoffStatus::Inactive,
            handoff_generation: 0,
            last_error: None,
            closed: false,
        }
    }

    /// Initial state for a configured session; the welcome message, if any,
    /// is visible immediately rather than queued.
    pub fn from_config(config: &SessionConfig) -> Self {
        let mut state = Self::new(config.host.clone(), config.title.clone());
        if let Some(welcome) = &config.welcome_message {
            state
                .visible
                .push(ChatMessage::bot(crate::message::MessagePayload::text(welcome)));
        }
        state
    }

    /// True while the wait timer is pending or bot messages are queued
    pub fn awaiting_reply(&self) -> bool {
        matches!(self.wait, WaitTimer::Armed { .. }) || !self.pending.is_empty()
    }

    pub fn phase(&self) -> SessionPhase {
        if !self.pending.is_empty() {
            SessionPhase::Draining
        } else if self.awaiting_reply() {
            SessionPhase::AwaitingReply
        } else {
            SessionPhase::Idle
        }
    }
}

/// Immutable inputs to every transition
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user_id: String,
    /// Endpoint the session started on; named in handoff acknowledgements
    pub origin_host: String,
    pub waiting_timeout: Duration,
    pub commands: CommandFilter,
}

impl SessionContext {
    pub fn new(
        user_id: impl Into<String>,
        origin_host: impl Into<String>,
        waiting_timeout: Duration,
        commands: CommandFilter,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            origin_host: origin_host.into(),
            waiting_timeout,
            commands,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.user_id.clone(),
            config.host.clone(),
            config.waiting_timeout,
            config.command_filter(),
        )
    }
}
