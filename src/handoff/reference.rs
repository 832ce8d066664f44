//! Conversation reference parsing

use super::HandoffError;
use std::fmt;

const CONVERSATION_MARKER: &str = "conversations/";
const PATH_TERMINATOR: &str = "/messages";

/// Numeric live-chat conversation id, kept in its literal form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId(String);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the id between `conversations/` and `/messages` in a handoff
/// endpoint. The id must be a non-negative integer literal.
pub fn parse_conversation_id(endpoint: &str) -> Result<ConversationId, HandoffError> {
    let invalid = || HandoffError::InvalidConversationReference {
        endpoint: endpoint.to_string(),
    };

    let (_, rest) = endpoint.split_once(CONVERSATION_MARKER).ok_or_else(invalid)?;
    let (id, _) = rest.split_once(PATH_TERMINATOR).ok_or_else(invalid)?;

    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    Ok(ConversationId(id.to_string()))
}
