//! API request and response types

use serde::{Deserialize, Serialize};

/// Request to send a user message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

/// Request for a button click. `title` is accepted for `label`.
#[derive(Debug, Deserialize)]
pub struct ButtonClickRequest {
    #[serde(alias = "title")]
    pub label: String,
    pub payload: String,
}

/// Response for user actions
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub queued: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
