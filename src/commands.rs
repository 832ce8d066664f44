//! Recognized-command filter
//!
//! Control utterances are forwarded to the backend but never shown as a
//! visible turn. A command is either an exact blacklist entry or starts with
//! `/<intent>` for the configured handoff intent.

use regex::Regex;

pub const DEFAULT_BLACKLIST: [&str; 4] = ["_restart", "_start", "/restart", "/start"];
pub const DEFAULT_HANDOFF_INTENT: &str = "handoff";

#[derive(Debug, Clone)]
pub struct CommandFilter {
    exact: Vec<String>,
    intent_prefix: Option<Regex>,
    handoff_intent: String,
}

impl CommandFilter {
    pub fn new(exact: Vec<String>, handoff_intent: &str) -> Self {
        let intent_prefix = if handoff_intent.is_empty() {
            None
        } else {
            Regex::new(&format!(r"^/{}\b", regex::escape(handoff_intent))).ok()
        };
        Self {
            exact,
            intent_prefix,
            handoff_intent: handoff_intent.to_string(),
        }
    }

    /// Whether `text` is a control utterance that must not be displayed
    pub fn is_command(&self, text: &str) -> bool {
        self.exact.iter().any(|c| c == text)
            || self
                .intent_prefix
                .as_ref()
                .is_some_and(|re| re.is_match(text))
    }

    /// Utterance acknowledging a handoff to the automated backend
    pub fn handoff_acknowledgement(&self, origin_host: &str) -> String {
        let from = serde_json::json!({ "from_host": origin_host });
        format!("/{}{from}", self.handoff_intent)
    }
}

impl Default for CommandFilter {
    fn default() -> Self {
        Self::new(
            DEFAULT_BLACKLIST.iter().map(ToString::to_string).collect(),
            DEFAULT_HANDOFF_INTENT,
        )
    }
}
