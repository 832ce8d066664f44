//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::{spawn_session, SessionHandle, SessionView, TokioScheduler};
use crate::backend::{BackendClient, BackendError, BackendReply};
use crate::config::SessionConfig;
use crate::handoff::{ConversationId, HandoffError, LiveChatService, RealtimeConnection};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// ============================================================================
// Mock Backend
// ============================================================================

/// A request recorded by `MockBackend`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub endpoint: String,
    pub sender: String,
    pub message: String,
}

/// Backend that answers from a queue. With nothing queued it never answers,
/// like a bot that is still thinking.
#[derive(Clone, Default)]
pub struct MockBackend {
    responses: Arc<Mutex<VecDeque<Result<Vec<Value>, BackendError>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    latency: Duration,
}

#[allow(dead_code)]
impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn queue_replies(&self, replies: Vec<BackendReply>) {
        let raw = replies
            .iter()
            .map(|r| serde_json::to_value(r).unwrap())
            .collect();
        self.queue_raw(raw);
    }

    /// Queue reply elements exactly as a webhook would return them
    pub fn queue_raw(&self, replies: Vec<Value>) {
        self.responses.lock().unwrap().push_back(Ok(replies));
    }

    pub fn queue_error(&self, error: BackendError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendClient for MockBackend {
    async fn send(
        &self,
        endpoint: &str,
        sender: &str,
        message: &str,
    ) -> Result<Vec<Value>, BackendError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            endpoint: endpoint.to_string(),
            sender: sender.to_string(),
            message: message.to_string(),
        });
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None => futures::future::pending().await,
        }
    }
}

// ============================================================================
// Mock Realtime Connection
// ============================================================================

/// Scripted realtime connection. Frames pushed before `recv` are delivered in
/// order; afterwards the connection closes unless `held_open`.
pub struct MockConnection {
    feeder: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<String>,
    hold_open: bool,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl MockConnection {
    pub fn new() -> Self {
        let (feeder, inbound) = mpsc::unbounded_channel();
        Self {
            feeder,
            inbound,
            hold_open: false,
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn held_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn push_inbound(&self, frame: &str) {
        let _ = self.feeder.send(frame.to_string());
    }

    /// Sender for frames delivered after the connection has been handed off
    pub fn feeder(&self) -> mpsc::UnboundedSender<String> {
        self.feeder.clone()
    }

    pub fn sent_frames(&self) -> Arc<Mutex<Vec<String>>> {
        self.sent.clone()
    }

    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RealtimeConnection for MockConnection {
    async fn send(&mut self, frame: String) -> Result<(), HandoffError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(HandoffError::Connection("connection closed".into()));
        }
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, HandoffError>> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        if self.hold_open {
            self.inbound.recv().await.map(Ok)
        } else {
            self.inbound.try_recv().ok().map(Ok)
        }
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Mock Live Chat
// ============================================================================

pub struct MockLiveChat {
    token: Option<String>,
    connection: Mutex<Option<MockConnection>>,
    lookups: Mutex<Vec<String>>,
    connects: AtomicUsize,
}

#[allow(dead_code)]
impl MockLiveChat {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            connection: Mutex::new(None),
            lookups: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn without_token() -> Self {
        Self {
            token: None,
            ..Self::with_token("")
        }
    }

    pub fn with_connection(self, connection: MockConnection) -> Self {
        *self.connection.lock().unwrap() = Some(connection);
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LiveChatService for MockLiveChat {
    async fn lookup_token(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<String>, HandoffError> {
        self.lookups
            .lock()
            .unwrap()
            .push(conversation_id.to_string());
        Ok(self.token.clone())
    }

    async fn connect(&self) -> Result<Box<dyn RealtimeConnection>, HandoffError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let connection = self.connection.lock().unwrap().take().unwrap_or_default();
        Ok(Box::new(connection))
    }
}

// ============================================================================
// Test Session Builder
// ============================================================================

pub struct TestSession {
    config: SessionConfig,
    backend: MockBackend,
    live_chat: Arc<MockLiveChat>,
}

pub struct RunningSession {
    pub handle: SessionHandle,
    pub backend: MockBackend,
    pub live_chat: Arc<MockLiveChat>,
    pub task: JoinHandle<()>,
}

#[allow(dead_code)]
impl TestSession {
    pub fn new() -> Self {
        Self {
            config: SessionConfig {
                user_id: "test-user".to_string(),
                host: "http://bot:5005".to_string(),
                ..SessionConfig::default()
            },
            backend: MockBackend::new(),
            live_chat: Arc::new(MockLiveChat::without_token()),
        }
    }

    pub fn config(mut self, f: impl FnOnce(&mut SessionConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn backend(mut self, backend: MockBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn live_chat(mut self, live_chat: MockLiveChat) -> Self {
        self.live_chat = Arc::new(live_chat);
        self
    }

    pub fn build(self) -> RunningSession {
        let (handle, task) = spawn_session(
            &self.config,
            self.backend.clone(),
            self.live_chat.clone(),
            TokioScheduler,
        );
        RunningSession {
            handle,
            backend: self.backend,
            live_chat: self.live_chat,
            task,
        }
    }
}

impl Default for TestSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RunningSession {
    pub fn view(&self) -> SessionView {
        self.handle.view()
    }

    /// Texts of visible messages, in display order
    pub fn visible_texts(&self) -> Vec<String> {
        self.view()
            .messages
            .iter()
            .filter_map(|m| m.payload.as_text().map(str::to_string))
            .collect()
    }
}

/// Advance (paused) time by `ms`, letting every ready task run first
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Author, MessagePayload};
    use crate::state_machine::{Event, HandoffStatus, SessionPhase};
    use serde_json::json;

    const AGENT_FRAME: &str =
        r#"{"message":{"event":"message.created","data":{"message_type":1,"content":"Hi, I'm Sam"}}}"#;

    #[tokio::test]
    async fn test_mock_backend_replays_queue() {
        let backend = MockBackend::new();
        backend.queue_replies(vec![BackendReply::text("one")]);

        let replies = backend.send("http://bot", "u", "hi").await.unwrap();
        assert_eq!(replies, vec![json!({"text": "one"})]);
        assert_eq!(backend.recorded_requests()[0].message, "hi");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_flag_expires_without_reply() {
        let rt = TestSession::new().build();
        rt.handle.send_message("hello").await.unwrap();
        advance(1).await;

        let view = rt.view();
        assert!(view.awaiting_reply);
        assert_eq!(view.phase, SessionPhase::AwaitingReply);
        assert_eq!(rt.visible_texts(), vec!["hello"]);

        advance(4900).await;
        assert!(rt.view().awaiting_reply);

        advance(200).await;
        assert!(!rt.view().awaiting_reply);

        advance(10_000).await;
        assert!(!rt.view().awaiting_reply);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replies_revealed_one_per_tick() {
        let backend = MockBackend::new();
        backend.queue_replies(vec![
            BackendReply::text("A"),
            BackendReply::text("B"),
            BackendReply::text("C"),
        ]);
        let rt = TestSession::new().backend(backend).build();
        rt.handle.send_message("hi").await.unwrap();

        advance(790).await;
        assert_eq!(rt.visible_texts(), vec!["hi"]);
        assert_eq!(rt.view().phase, SessionPhase::Draining);

        advance(20).await; // t = 810
        assert_eq!(rt.visible_texts(), vec!["hi", "A"]);

        advance(800).await; // t = 1610
        assert_eq!(rt.visible_texts(), vec!["hi", "A", "B"]);
        assert!(rt.view().awaiting_reply);

        advance(780).await; // t = 2390
        assert!(rt.view().awaiting_reply);

        advance(20).await; // t = 2410
        assert_eq!(rt.visible_texts(), vec!["hi", "A", "B", "C"]);
        assert!(!rt.view().awaiting_reply);
        assert_eq!(rt.view().phase, SessionPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sending_reveals_queued_messages_immediately() {
        let backend = MockBackend::new();
        backend.queue_replies(vec![BackendReply::text("A"), BackendReply::text("B")]);
        let rt = TestSession::new().backend(backend).build();

        rt.handle.send_message("first").await.unwrap();
        advance(1).await;
        rt.handle.send_message("second").await.unwrap();
        advance(1).await;

        assert_eq!(rt.visible_texts(), vec!["first", "A", "B", "second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_forwarded_but_hidden() {
        let backend = MockBackend::new();
        backend.queue_replies(vec![BackendReply::text("Welcome back")]);
        let rt = TestSession::new().backend(backend).build();

        rt.handle.send_message("/start").await.unwrap();
        rt.handle.send_message("").await.unwrap();
        advance(1).await;

        assert!(rt.visible_texts().is_empty());
        let requests = rt.backend.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].message, "/start");
        assert_eq!(requests[0].sender, "test-user");
        assert_eq!(requests[0].endpoint, "http://bot:5005");

        advance(800).await;
        assert_eq!(rt.visible_texts(), vec!["Welcome back"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_button_click_sends_payload() {
        let rt = TestSession::new().build();
        rt.handle.button_click("Yes please", "/affirm").await.unwrap();
        advance(1).await;

        assert_eq!(rt.backend.recorded_requests()[0].message, "/affirm");
        let view = rt.view();
        assert_eq!(view.messages[0].author, Author::User);
        assert_eq!(view.messages[0].payload, MessagePayload::text("/affirm"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_welcome_message_visible_at_start() {
        let rt = TestSession::new()
            .config(|c| c.welcome_message = Some("Hello! How can I help?".into()))
            .build();
        assert_eq!(rt.visible_texts(), vec!["Hello! How can I help?"]);
        assert!(!rt.view().awaiting_reply);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_reply_surfaces_error_without_output() {
        let backend = MockBackend::new();
        backend.queue_replies(vec![BackendReply::text("ok"), BackendReply::default()]);
        let rt = TestSession::new().backend(backend).build();

        rt.handle.send_message("hi").await.unwrap();
        advance(2000).await;
        let view = rt.view();
        assert_eq!(rt.visible_texts(), vec!["hi"]);
        assert!(view.last_error.unwrap().contains("reply 1"));
        assert!(view.awaiting_reply);

        advance(3100).await;
        assert!(!rt.view().awaiting_reply);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ill_shaped_element_reported_by_position() {
        let backend = MockBackend::new();
        backend.queue_raw(vec![json!({"text": "ok"}), json!("oops")]);
        let rt = TestSession::new().backend(backend).build();

        rt.handle.send_message("hi").await.unwrap();
        advance(1000).await;

        let error = rt.view().last_error.unwrap();
        assert!(error.contains("reply 1"), "{error}");
        assert_eq!(rt.visible_texts(), vec!["hi"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_message_stamped_when_processed() {
        let backend = MockBackend::new();
        backend.queue_replies(vec![BackendReply::text("A")]);
        let rt = TestSession::new().backend(backend).build();

        rt.handle.send_message("first").await.unwrap();
        advance(1).await;

        // Built long before it reaches the session
        let stale = Event::UserMessage {
            text: "second".into(),
            message_id: "late-user-message".into(),
            timestamp: chrono::Utc::now() - chrono::Duration::hours(1),
        };
        rt.handle.event_tx.send(stale).await.unwrap();
        advance(1).await;

        assert_eq!(rt.visible_texts(), vec!["first", "A", "second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_failure_is_reported() {
        let backend = MockBackend::new();
        backend.queue_error(BackendError::Transport("connection refused".into()));
        let rt = TestSession::new().backend(backend).build();

        rt.handle.send_message("hi").await.unwrap();
        advance(1).await;
        assert!(rt.view().last_error.unwrap().contains("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handoff_end_to_end() {
        let backend = MockBackend::new();
        backend.queue_replies(vec![
            BackendReply::text("Transferring you to an agent"),
            BackendReply {
                custom: Some(json!({
                    "handoff_host": "http://live:3000/conversations/482/messages",
                    "title": "Live support"
                })),
                ..BackendReply::default()
            },
        ]);
        backend.queue_replies(vec![]);

        let connection = MockConnection::new().held_open();
        let feeder = connection.feeder();
        let sent = connection.sent_frames();
        let live_chat = MockLiveChat::with_token("pubsub-tok").with_connection(connection);

        let rt = TestSession::new().backend(backend).live_chat(live_chat).build();
        rt.handle.send_message("I want a human").await.unwrap();
        advance(1).await;

        let view = rt.view();
        assert_eq!(view.title, "Live support");
        assert_eq!(view.endpoint, "http://live:3000/conversations/482/messages");
        assert_eq!(
            view.handoff,
            HandoffStatus::Live {
                conversation_id: "482".into()
            }
        );
        assert_eq!(rt.live_chat.lookups(), vec!["482".to_string()]);
        assert_eq!(sent.lock().unwrap().len(), 1);

        let requests = rt.backend.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].endpoint, "http://bot:5005");
        assert_eq!(requests[1].message, r#"/handoff{"from_host":"http://bot:5005"}"#);

        feeder.send(r#"{"type":"ping","message":1}"#.into()).unwrap();
        feeder.send(AGENT_FRAME.into()).unwrap();
        advance(1700).await;

        assert_eq!(
            rt.visible_texts(),
            vec!["I want a human", "Transferring you to an agent", "Hi, I'm Sam"]
        );
        assert!(!rt
            .visible_texts()
            .iter()
            .any(|t| t.starts_with("/handoff")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handoff_without_token_keeps_bot_session() {
        let backend = MockBackend::new();
        backend.queue_replies(vec![BackendReply {
            custom: Some(json!({"handoff_host": "http://live/conversations/7/messages"})),
            ..BackendReply::default()
        }]);
        let rt = TestSession::new().backend(backend).build();

        rt.handle.send_message("agent").await.unwrap();
        advance(1).await;

        assert_eq!(rt.live_chat.connect_count(), 0);
        assert!(matches!(rt.view().handoff, HandoffStatus::Ended { .. }));
        assert_eq!(rt.visible_texts(), vec!["agent"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_conversation_reference_opens_nothing() {
        let backend = MockBackend::new();
        backend.queue_replies(vec![BackendReply {
            custom: Some(json!({"handoff_host": "http://live/conversations/abc/messages"})),
            ..BackendReply::default()
        }]);
        let rt = TestSession::new()
            .backend(backend)
            .live_chat(MockLiveChat::with_token("tok"))
            .build();

        rt.handle.send_message("agent").await.unwrap();
        advance(1).await;

        assert!(rt.live_chat.lookups().is_empty());
        assert_eq!(rt.live_chat.connect_count(), 0);
        assert!(matches!(rt.view().handoff, HandoffStatus::Ended { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_everything() {
        let backend = MockBackend::new();
        backend.queue_replies(vec![
            BackendReply::text("A"),
            BackendReply {
                custom: Some(json!({"handoff_host": "http://live/conversations/5/messages"})),
                ..BackendReply::default()
            },
        ]);
        let connection = MockConnection::new().held_open();
        let closed = connection.closed_flag();
        let feeder = connection.feeder();
        let live_chat = MockLiveChat::with_token("tok").with_connection(connection);
        let rt = TestSession::new().backend(backend).live_chat(live_chat).build();

        rt.handle.send_message("hi").await.unwrap();
        advance(1).await;
        rt.handle.shutdown().await.unwrap();
        advance(1).await;

        assert!(rt.view().closed);
        assert!(closed.load(Ordering::SeqCst));
        assert!(rt.task.is_finished());

        let _ = feeder.send(AGENT_FRAME.into());
        advance(5000).await;
        assert_eq!(rt.visible_texts(), vec!["hi"]);
        assert!(rt.handle.send_message("anyone?").await.is_err());
    }
}
