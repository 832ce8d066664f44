//! Session runtime
//!
//! Owns the single session, serializes every event through the pure state
//! machine, and exposes the render boundary through `SessionHandle`.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::{Scheduler, TokioScheduler};

use crate::backend::{BackendClient, RestWebhookClient};
use crate::config::SessionConfig;
use crate::handoff::{HttpLiveChat, LiveChatService};
use crate::message::{display_order, ChatMessage};
use crate::state_machine::{Event, HandoffStatus, SessionContext, SessionPhase, SessionState};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// What a renderer needs to draw the chat window
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub messages: Vec<ChatMessage>,
    pub awaiting_reply: bool,
    pub phase: SessionPhase,
    pub title: String,
    pub endpoint: String,
    pub handoff: HandoffStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub closed: bool,
}

impl SessionView {
    pub fn from_state(state: &SessionState) -> Self {
        Self {
            messages: display_order(&state.visible),
            awaiting_reply: state.awaiting_reply(),
            phase: state.phase(),
            title: state.active_title.clone(),
            endpoint: state.active_endpoint.clone(),
            handoff: state.handoff.clone(),
            last_error: state.last_error.clone(),
            closed: state.closed,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is closed")]
    Closed,
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    event_tx: mpsc::Sender<Event>,
    view_rx: watch::Receiver<SessionView>,
}

impl SessionHandle {
    pub async fn send_message(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send_event(Event::user_message(text)).await
    }

    /// A button click is a message carrying the button's payload
    pub async fn button_click(&self, label: &str, payload: &str) -> Result<(), SessionError> {
        tracing::debug!(label, payload, "Button clicked");
        self.send_message(payload).await
    }

    /// Tear down: timers stop, the realtime connection closes, and no
    /// further event mutates the session.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.send_event(Event::Teardown).await
    }

    pub fn view(&self) -> SessionView {
        self.view_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view_rx.clone()
    }

    async fn send_event(&self, event: Event) -> Result<(), SessionError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| SessionError::Closed)
    }
}

/// Start a session runtime on the current tokio runtime
pub fn spawn_session<B, L, S>(
    config: &SessionConfig,
    backend: B,
    live_chat: L,
    scheduler: S,
) -> (SessionHandle, JoinHandle<()>)
where
    B: BackendClient + 'static,
    L: LiveChatService + 'static,
    S: Scheduler + 'static,
{
    let state = SessionState::from_config(config);
    let (event_tx, event_rx) = mpsc::channel(64);
    let (view_tx, view_rx) = watch::channel(SessionView::from_state(&state));

    let runtime = SessionRuntime::new(
        SessionContext::from_config(config),
        state,
        Arc::new(backend),
        Arc::new(live_chat),
        scheduler,
        config.message_delay,
        event_rx,
        event_tx.clone(),
        view_tx,
    );
    let task = tokio::spawn(runtime.run());

    (SessionHandle { event_tx, view_rx }, task)
}

/// Production session: REST webhook, HTTP/websocket live chat, tokio timers
pub fn spawn_production_session(
    config: &SessionConfig,
) -> Result<(SessionHandle, JoinHandle<()>), Box<dyn std::error::Error + Send + Sync>> {
    let request_timeout = Duration::from_secs(30);
    let backend = RestWebhookClient::new(request_timeout)?;
    let live_chat = HttpLiveChat::new(config.live_chat.clone(), request_timeout)?;
    Ok(spawn_session(config, backend, live_chat, TokioScheduler))
}
