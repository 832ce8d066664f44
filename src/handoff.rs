//! Live handoff from the bot to a human agent
//!
//! Resolves the conversation id from the handoff endpoint, exchanges it for a
//! subscription token, opens the realtime channel and subscribes. Inbound
//! agent messages are fed back to the session as events, exactly like bot
//! replies. Every failure here is logged and ends the handoff; none of them
//! touch the bot conversation.

mod frames;
mod live_chat;
mod reference;

pub use frames::{handle_frame, subscribe_frame};
pub use live_chat::HttpLiveChat;
pub use reference::{parse_conversation_id, ConversationId};

use crate::state_machine::{Event, HandoffStatus};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("invalid conversation reference in {endpoint:?}")]
    InvalidConversationReference { endpoint: String },
    #[error("no subscription token available for conversation {0}")]
    TokenUnavailable(ConversationId),
    #[error("token lookup failed: {0}")]
    Lookup(String),
    #[error("realtime connection error: {0}")]
    Connection(String),
}

/// Persistent, message-oriented connection to the realtime channel
#[async_trait]
pub trait RealtimeConnection: Send {
    async fn send(&mut self, frame: String) -> Result<(), HandoffError>;

    /// Next inbound text frame; `None` once the connection is closed
    async fn recv(&mut self) -> Option<Result<String, HandoffError>>;

    async fn close(&mut self);
}

/// Live-chat service: token lookup plus the realtime channel
#[async_trait]
pub trait LiveChatService: Send + Sync {
    /// `Ok(None)` means the conversation has no token yet
    async fn lookup_token(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<String>, HandoffError>;

    async fn connect(&self) -> Result<Box<dyn RealtimeConnection>, HandoffError>;
}

#[async_trait]
impl<T: LiveChatService + ?Sized> LiveChatService for Arc<T> {
    async fn lookup_token(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<String>, HandoffError> {
        (**self).lookup_token(conversation_id).await
    }

    async fn connect(&self) -> Result<Box<dyn RealtimeConnection>, HandoffError> {
        (**self).connect().await
    }
}

/// An established, subscribed handoff
pub struct HandoffSession {
    pub conversation_id: ConversationId,
    pub subscription_token: String,
    pub connection: Box<dyn RealtimeConnection>,
}

impl HandoffSession {
    async fn subscribe(&mut self) -> Result<(), HandoffError> {
        tracing::info!(conversation_id = %self.conversation_id, "Subscribing to live chat room");
        self.connection
            .send(subscribe_frame(&self.subscription_token))
            .await
    }
}

/// Resolve, look up, connect and subscribe. Nothing is opened unless the
/// endpoint parses and a token is available.
pub async fn establish<L>(live_chat: &L, endpoint: &str) -> Result<HandoffSession, HandoffError>
where
    L: LiveChatService + ?Sized,
{
    let conversation_id = parse_conversation_id(endpoint)?;
    tracing::debug!(conversation_id = %conversation_id, "Parsed live chat conversation");

    let subscription_token = live_chat
        .lookup_token(&conversation_id)
        .await?
        .ok_or_else(|| HandoffError::TokenUnavailable(conversation_id.clone()))?;

    let connection = live_chat.connect().await?;
    let mut session = HandoffSession {
        conversation_id,
        subscription_token,
        connection,
    };
    if let Err(e) = session.subscribe().await {
        session.connection.close().await;
        return Err(e);
    }
    Ok(session)
}

async fn report(events: &mpsc::Sender<Event>, generation: u64, status: HandoffStatus) {
    let _ = events
        .send(Event::HandoffStatus { generation, status })
        .await;
}

/// Drive one handoff until the connection ends or `cancel` fires.
/// No reconnection: a new directive is the only way to retry.
pub async fn run_handoff<L>(
    live_chat: &L,
    generation: u64,
    endpoint: String,
    events: mpsc::Sender<Event>,
    cancel: CancellationToken,
) where
    L: LiveChatService + ?Sized,
{
    let established = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::info!(generation, "Handoff cancelled before it was established");
            return;
        }
        result = establish(live_chat, &endpoint) => result,
    };

    let mut session = match established {
        Ok(session) => session,
        Err(HandoffError::TokenUnavailable(id)) => {
            tracing::info!(conversation_id = %id, "Handoff not ready: no subscription token");
            report(&events, generation, HandoffStatus::ended("token unavailable")).await;
            return;
        }
        Err(e) => {
            tracing::warn!(error = %e, endpoint = %endpoint, "Handoff aborted");
            report(&events, generation, HandoffStatus::ended(e.to_string())).await;
            return;
        }
    };

    report(
        &events,
        generation,
        HandoffStatus::Live {
            conversation_id: session.conversation_id.to_string(),
        },
    )
    .await;

    let reason = loop {
        let frame = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!(conversation_id = %session.conversation_id, "Closing superseded realtime connection");
                session.connection.close().await;
                return;
            }
            frame = session.connection.recv() => frame,
        };

        match frame {
            Some(Ok(raw)) => {
                let messages = handle_frame(&session, &raw);
                if !messages.is_empty()
                    && events
                        .send(Event::AgentMessages { generation, messages })
                        .await
                        .is_err()
                {
                    session.connection.close().await;
                    return;
                }
            }
            Some(Err(e)) => {
                tracing::warn!(conversation_id = %session.conversation_id, error = %e, "Realtime connection error");
                break e.to_string();
            }
            None => {
                tracing::info!(conversation_id = %session.conversation_id, "Realtime connection closed");
                break "connection closed".to_string();
            }
        }
    };

    report(&events, generation, HandoffStatus::ended(reason)).await;
}
