//! HTTP token lookup and websocket realtime channel

use super::{ConversationId, HandoffError, LiveChatService, RealtimeConnection};
use crate::config::LiveChatConfig;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[derive(Debug, Deserialize)]
struct PubsubResponse {
    #[serde(default)]
    pubsub: Option<String>,
}

/// Live-chat service reached over HTTP (token lookup) and a websocket
/// (realtime room)
pub struct HttpLiveChat {
    client: Client,
    config: LiveChatConfig,
}

impl HttpLiveChat {
    pub fn new(config: LiveChatConfig, timeout: Duration) -> Result<Self, HandoffError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HandoffError::Lookup(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn pubsub_url(&self, conversation_id: &ConversationId) -> String {
        format!(
            "{}/conversations/{}/pubsub",
            self.config.api_base.trim_end_matches('/'),
            conversation_id
        )
    }
}

#[async_trait]
impl LiveChatService for HttpLiveChat {
    async fn lookup_token(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<String>, HandoffError> {
        let url = self.pubsub_url(conversation_id);
        tracing::debug!(url = %url, "Looking up subscription token");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| HandoffError::Lookup(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HandoffError::Lookup(format!("HTTP {status} from {url}")));
        }

        let body: PubsubResponse = response
            .json()
            .await
            .map_err(|e| HandoffError::Lookup(format!("invalid token response: {e}")))?;

        Ok(body.pubsub.filter(|token| !token.is_empty()))
    }

    async fn connect(&self) -> Result<Box<dyn RealtimeConnection>, HandoffError> {
        tracing::debug!(url = %self.config.cable_url, "Opening realtime connection");
        let (stream, _response) = connect_async(self.config.cable_url.as_str())
            .await
            .map_err(|e| HandoffError::Connection(e.to_string()))?;
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl RealtimeConnection for WsConnection {
    async fn send(&mut self, frame: String) -> Result<(), HandoffError> {
        self.stream
            .send(Message::Text(frame))
            .await
            .map_err(|e| HandoffError::Connection(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, HandoffError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(HandoffError::Connection(e.to_string()))),
            };
            match message {
                Message::Text(text) => return Some(Ok(text)),
                Message::Binary(bytes) => {
                    return Some(
                        String::from_utf8(bytes)
                            .map_err(|e| HandoffError::Connection(format!("non-UTF-8 frame: {e}"))),
                    )
                }
                Message::Close(_) => return None,
                // tungstenite answers pings itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "Realtime connection already closed");
        }
    }
}
