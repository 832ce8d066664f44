//! Automated dialogue backend (REST webhook)

use crate::message::Button;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// One reply object returned by the webhook. Untrusted: any combination of
/// fields may be present, including none. The client hands back raw JSON;
/// the translator decodes each element so a bad one can be reported by
/// position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<Button>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick_replies: Option<Vec<Button>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
}

#[cfg(test)]
impl BackendReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize)]
struct WebhookRequest<'a> {
    message: &'a str,
    sender: &'a str,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("webhook request failed: {0}")]
    Transport(String),
    #[error("webhook returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode webhook response: {0}")]
    Decode(String),
}

/// Client for a dialogue backend's REST channel
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Post a user utterance to `endpoint`, returning the backend's reply
    /// elements undecoded
    async fn send(
        &self,
        endpoint: &str,
        sender: &str,
        message: &str,
    ) -> Result<Vec<Value>, BackendError>;
}

/// `POST {endpoint}/webhooks/rest/webhook`
pub struct RestWebhookClient {
    client: Client,
}

impl RestWebhookClient {
    pub fn new(timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn webhook_url(endpoint: &str) -> String {
        format!("{}/webhooks/rest/webhook", endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl BackendClient for RestWebhookClient {
    async fn send(
        &self,
        endpoint: &str,
        sender: &str,
        message: &str,
    ) -> Result<Vec<Value>, BackendError> {
        let response = self
            .client
            .post(Self::webhook_url(endpoint))
            .json(&WebhookRequest { message, sender })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Transport(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    BackendError::Transport(format!("Connection failed: {e}"))
                } else {
                    BackendError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| BackendError::Decode(format!("{e} - body: {body}")))
    }
}
