//! Session runtime executor

use super::traits::{Scheduler, TimerHandle};
use super::SessionView;
use crate::backend::BackendClient;
use crate::handoff::{run_handoff, LiveChatService};
use crate::message::creation_time;
use crate::state_machine::{transition, Effect, Event, SessionContext, SessionState, TransitionError};
use crate::translator::translate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Generic session runtime that can work with any backend, live-chat and
/// scheduler implementations
pub struct SessionRuntime<B, L, S>
where
    B: BackendClient + 'static,
    L: LiveChatService + 'static,
    S: Scheduler + 'static,
{
    context: SessionContext,
    state: SessionState,
    backend: Arc<B>,
    live_chat: Arc<L>,
    scheduler: S,
    message_delay: Duration,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    view_tx: watch::Sender<SessionView>,
    /// Outstanding response-wait timer (at most one)
    wait_timer: Option<TimerHandle>,
    display_ticker: Option<TimerHandle>,
    /// Cancels the running handoff task and its connection
    handoff_cancel: Option<CancellationToken>,
}

impl<B, L, S> SessionRuntime<B, L, S>
where
    B: BackendClient + 'static,
    L: LiveChatService + 'static,
    S: Scheduler + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: SessionContext,
        state: SessionState,
        backend: Arc<B>,
        live_chat: Arc<L>,
        scheduler: S,
        message_delay: Duration,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        view_tx: watch::Sender<SessionView>,
    ) -> Self {
        Self {
            context,
            state,
            backend,
            live_chat,
            scheduler,
            message_delay,
            event_rx,
            event_tx,
            view_tx,
            wait_timer: None,
            display_ticker: None,
            handoff_cancel: None,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(user_id = %self.context.user_id, endpoint = %self.state.active_endpoint, "Starting session runtime");

        self.display_ticker = Some(self.scheduler.every(
            self.message_delay,
            self.event_tx.clone(),
            Event::DisplayTick,
        ));

        // Process events in a loop until teardown
        while !self.state.closed {
            let Some(event) = self.event_rx.recv().await else {
                break;
            };
            self.process_event(event);
        }

        self.release();
        tracing::info!(user_id = %self.context.user_id, "Session runtime stopped");
    }

    fn process_event(&mut self, event: Event) {
        // User input is stamped on arrival so it sorts after everything
        // already revealed
        let event = match event {
            Event::UserMessage {
                text, message_id, ..
            } => Event::UserMessage {
                text,
                message_id,
                timestamp: creation_time(),
            },
            other => other,
        };

        let result = match transition(&self.state, &self.context, event) {
            Ok(r) => r,
            Err(TransitionError::EmptyMessage) => {
                tracing::debug!("Ignoring empty message");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Event rejected");
                return;
            }
        };

        self.state = result.new_state;
        for effect in result.effects {
            self.execute_effect(effect);
        }
    }

    /// Execute an effect. Anything that does I/O runs as a background task
    /// and reports back through the event channel.
    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::ArmWaitTimer {
                generation,
                timeout,
            } => {
                // Replacing the handle drops, and so cancels, the previous timer
                self.wait_timer = Some(self.scheduler.after(
                    timeout,
                    self.event_tx.clone(),
                    Event::WaitTimeout { generation },
                ));
            }

            Effect::CancelWaitTimer => {
                self.wait_timer = None;
            }

            Effect::RequestBackend { endpoint, text } => {
                let backend = self.backend.clone();
                let event_tx = self.event_tx.clone();
                let sender = self.context.user_id.clone();

                tokio::spawn(async move {
                    tracing::debug!(endpoint = %endpoint, "Sending message to bot (background)");
                    let event = match backend.send(&endpoint, &sender, &text).await {
                        Ok(replies) => match translate(&replies) {
                            Ok(translation) => Event::BotReplies { translation },
                            Err(error) => {
                                tracing::warn!(error = %error, replies = replies.len(), "Could not parse message from bot");
                                Event::ReplyRejected { error }
                            }
                        },
                        Err(e) => {
                            tracing::error!(error = %e, endpoint = %endpoint, "Bot request failed");
                            Event::BackendFailed {
                                message: e.to_string(),
                            }
                        }
                    };
                    let _ = event_tx.send(event).await;
                });
            }

            Effect::OpenHandoff {
                generation,
                endpoint,
            } => {
                if let Some(previous) = self.handoff_cancel.take() {
                    previous.cancel();
                }
                let cancel = CancellationToken::new();
                self.handoff_cancel = Some(cancel.clone());

                let live_chat = self.live_chat.clone();
                let event_tx = self.event_tx.clone();
                tracing::info!(generation, endpoint = %endpoint, "Switching to live agent");
                tokio::spawn(async move {
                    run_handoff(live_chat.as_ref(), generation, endpoint, event_tx, cancel).await;
                });
            }

            Effect::CloseHandoff => {
                if let Some(cancel) = self.handoff_cancel.take() {
                    cancel.cancel();
                }
            }

            Effect::StopDisplayTicker => {
                self.display_ticker = None;
            }

            Effect::PublishView => {
                self.view_tx.send_replace(SessionView::from_state(&self.state));
            }
        }
    }

    fn release(&mut self) {
        self.wait_timer = None;
        self.display_ticker = None;
        if let Some(cancel) = self.handoff_cancel.take() {
            cancel.cancel();
        }
    }
}
