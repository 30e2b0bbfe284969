use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform-native identifier of a human sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalId(pub i64);

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversation the message arrived in; replies and presence go back here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The sender of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub first_name: String,
    pub username: Option<String>,
}

impl Principal {
    /// Name used when introducing the human to the completion backend.
    pub fn display_name(&self) -> &str {
        if !self.first_name.is_empty() {
            return &self.first_name;
        }
        self.username.as_deref().unwrap_or("")
    }
}

/// Message payload carried by an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Channel-assigned message id. Zero means the channel did not identify it.
    pub message_id: i64,
    pub from: Principal,
    pub chat_id: ChatId,
    /// Plain text content; empty for media-only messages.
    pub text: String,
    /// When the channel received the message.
    pub date: DateTime<Utc>,
}

/// One inbound occurrence from the messaging channel.
///
/// `update_id` is strictly increasing for the lifetime of one polling cursor.
/// Non-message updates (edits, reactions, ...) carry `message: None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub update_id: i64,
    pub message: Option<InboundMessage>,
}

/// Ephemeral presence indicator shown to the principal while work is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceKind {
    Typing,
}

impl fmt::Display for PresenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresenceKind::Typing => write!(f, "typing"),
        }
    }
}

/// The bot account returned by the channel's identity call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    pub id: i64,
    pub username: String,
}
