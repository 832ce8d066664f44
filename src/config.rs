//! Session configuration
//!
//! Read from environment variables, falling back to reference defaults.

use crate::commands::{CommandFilter, DEFAULT_BLACKLIST, DEFAULT_HANDOFF_INTENT};
use std::time::Duration;

pub const DEFAULT_WAITING_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_MESSAGE_DELAY: Duration = Duration::from_millis(800);

/// Where the live-chat (human operator) service lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveChatConfig {
    /// Base URL for `GET /conversations/{id}/pubsub`
    pub api_base: String,
    /// Realtime channel, e.g. `ws://host/cable`
    pub cable_url: String,
}

impl Default for LiveChatConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:3033".to_string(),
            cable_url: "ws://localhost:3000/cable".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub user_id: String,
    /// Initial bot endpoint
    pub host: String,
    pub title: String,
    pub welcome_message: Option<String>,
    pub waiting_timeout: Duration,
    /// Display tick period
    pub message_delay: Duration,
    pub message_blacklist: Vec<String>,
    pub handoff_intent: String,
    pub live_chat: LiveChatConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: uuid::Uuid::new_v4().to_string(),
            host: "http://localhost:5005".to_string(),
            title: "Chat".to_string(),
            welcome_message: None,
            waiting_timeout: DEFAULT_WAITING_TIMEOUT,
            message_delay: DEFAULT_MESSAGE_DELAY,
            message_blacklist: DEFAULT_BLACKLIST.iter().map(ToString::to_string).collect(),
            handoff_intent: DEFAULT_HANDOFF_INTENT.to_string(),
            live_chat: LiveChatConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let message_blacklist = non_empty("CHAT_MESSAGE_BLACKLIST").map_or(
            defaults.message_blacklist,
            |raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            },
        );

        Self {
            user_id: non_empty("CHAT_USER_ID").unwrap_or(defaults.user_id),
            host: non_empty("CHAT_BOT_HOST").unwrap_or(defaults.host),
            title: non_empty("CHAT_TITLE").unwrap_or(defaults.title),
            welcome_message: non_empty("CHAT_WELCOME_MESSAGE"),
            waiting_timeout: millis(&lookup, "CHAT_WAITING_TIMEOUT_MS")
                .unwrap_or(defaults.waiting_timeout),
            message_delay: millis(&lookup, "CHAT_MESSAGE_DELAY_MS")
                .filter(|d| !d.is_zero())
                .unwrap_or(defaults.message_delay),
            message_blacklist,
            handoff_intent: lookup("CHAT_HANDOFF_INTENT").unwrap_or(defaults.handoff_intent),
            live_chat: LiveChatConfig {
                api_base: non_empty("LIVE_CHAT_API").unwrap_or(defaults.live_chat.api_base),
                cable_url: non_empty("LIVE_CHAT_CABLE").unwrap_or(defaults.live_chat.cable_url),
            },
        }
    }

    pub fn command_filter(&self) -> CommandFilter {
        CommandFilter::new(self.message_blacklist.clone(), &self.handoff_intent)
    }
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "Ignoring invalid duration, using default");
            None
        }
    }
}
