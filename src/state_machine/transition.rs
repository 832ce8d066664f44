//! Pure state transition function
//!
//! Every mutation of session state goes through `transition`. Timers, HTTP
//! calls and the realtime connection are requested as effects and run by the
//! executor afterwards.

use super::state::WaitTimer;
use super::{Effect, Event, HandoffStatus, SessionContext, SessionState};
use crate::message::{Author, ChatMessage, MessagePayload};
use crate::translator::{HandoffDirective, Translation};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Empty message ignored")]
    EmptyMessage,
    #[error("Session has been torn down")]
    SessionClosed,
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
pub fn transition(
    state: &SessionState,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    if state.closed {
        return Err(TransitionError::SessionClosed);
    }

    match event {
        Event::UserMessage {
            text,
            message_id,
            timestamp,
        } => {
            if text.is_empty() {
                return Err(TransitionError::EmptyMessage);
            }
            let mut next = state.clone();
            next.last_error = None;

            if !context.commands.is_command(&text) {
                reveal_all(&mut next);
                next.visible.push(ChatMessage {
                    id: message_id,
                    author: Author::User,
                    timestamp,
                    payload: MessagePayload::text(text.clone()),
                });
            }

            let mut effects = Vec::new();
            let endpoint = next.active_endpoint.clone();
            forward_utterance(&mut next, context, endpoint, text, &mut effects);
            Ok(TransitionResult::new(next)
                .with_effects(effects)
                .with_effect(Effect::PublishView))
        }

        Event::BotReplies { translation } => {
            let Translation {
                messages,
                directives,
            } = translation;
            let mut next = state.clone();
            let mut effects = vec![Effect::CancelWaitTimer];
            next.wait = WaitTimer::Idle;
            next.pending.extend(messages);

            for directive in directives {
                apply_directive(&mut next, context, directive, &mut effects);
            }

            Ok(TransitionResult::new(next)
                .with_effects(effects)
                .with_effect(Effect::PublishView))
        }

        // The wait timer stays armed; it expires as if nothing had arrived.
        Event::ReplyRejected { error } => {
            let mut next = state.clone();
            next.last_error = Some(error.to_string());
            Ok(TransitionResult::new(next).with_effect(Effect::PublishView))
        }

        Event::BackendFailed { message } => {
            let mut next = state.clone();
            next.last_error = Some(message);
            Ok(TransitionResult::new(next).with_effect(Effect::PublishView))
        }

        Event::DisplayTick => {
            if state.pending.is_empty() {
                return Ok(TransitionResult::new(state.clone()));
            }
            let mut next = state.clone();
            if let Some(message) = next.pending.pop_front() {
                next.visible.push(message);
            }
            Ok(TransitionResult::new(next).with_effect(Effect::PublishView))
        }

        Event::WaitTimeout { generation } => {
            if state.wait != (WaitTimer::Armed { generation }) {
                return Ok(TransitionResult::new(state.clone()));
            }
            let mut next = state.clone();
            next.wait = WaitTimer::Idle;
            Ok(TransitionResult::new(next).with_effect(Effect::PublishView))
        }

        Event::AgentMessages {
            generation,
            messages,
        } => {
            if generation != state.handoff_generation || messages.is_empty() {
                return Ok(TransitionResult::new(state.clone()));
            }
            let mut next = state.clone();
            next.pending.extend(messages);
            Ok(TransitionResult::new(next).with_effect(Effect::PublishView))
        }

        Event::HandoffStatus { generation, status } => {
            if generation != state.handoff_generation {
                return Ok(TransitionResult::new(state.clone()));
            }
            let mut next = state.clone();
            next.handoff = status;
            Ok(TransitionResult::new(next).with_effect(Effect::PublishView))
        }

        Event::Teardown => {
            let mut next = state.clone();
            next.closed = true;
            next.wait = WaitTimer::Idle;
            if next.handoff.is_open() {
                next.handoff = HandoffStatus::ended("session closed");
            }
            Ok(TransitionResult::new(next).with_effects([
                Effect::CancelWaitTimer,
                Effect::CloseHandoff,
                Effect::StopDisplayTicker,
                Effect::PublishView,
            ]))
        }
    }
}

/// Move every queued message to the visible list, in order
fn reveal_all(state: &mut SessionState) {
    let queued: Vec<ChatMessage> = state.pending.drain(..).collect();
    state.visible.extend(queued);
}

/// Arm the wait timer and send `text` to the backend at `endpoint`
fn forward_utterance(
    state: &mut SessionState,
    context: &SessionContext,
    endpoint: String,
    text: String,
    effects: &mut Vec<Effect>,
) {
    state.wait_generation += 1;
    state.wait = WaitTimer::Armed {
        generation: state.wait_generation,
    };
    effects.push(Effect::ArmWaitTimer {
        generation: state.wait_generation,
        timeout: context.waiting_timeout,
    });
    effects.push(Effect::RequestBackend { endpoint, text });
}

/// Acknowledge the handoff to the bot, switch endpoint/title and open the
/// live connection. A newer directive supersedes (and closes) an older one.
fn apply_directive(
    state: &mut SessionState,
    context: &SessionContext,
    directive: HandoffDirective,
    effects: &mut Vec<Effect>,
) {
    let bot_endpoint = state.active_endpoint.clone();
    let acknowledgement = context.commands.handoff_acknowledgement(&context.origin_host);
    forward_utterance(state, context, bot_endpoint, acknowledgement, effects);

    state.active_endpoint.clone_from(&directive.endpoint);
    if let Some(title) = directive.title {
        state.active_title = title;
    }

    if state.handoff.is_open() {
        effects.push(Effect::CloseHandoff);
    }
    state.handoff_generation += 1;
    state.handoff = HandoffStatus::Connecting {
        endpoint: directive.endpoint.clone(),
    };
    effects.push(Effect::OpenHandoff {
        generation: state.handoff_generation,
        endpoint: directive.endpoint,
    });
}
