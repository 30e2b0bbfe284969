//! Conversation state for the single authorized principal.
//!
//! The history is an append-only `Vec<Turn>` plus a recorded prefix length.
//! Position 0 always holds the active directive. Every directive-role turn
//! pushed before the first human turn belongs to the prefix, so `reset()` is a
//! plain `truncate(prefix_len)`.
//!
//! The orchestration loop is the only owner; there is no interior locking.

use serde::{Deserialize, Serialize};

use relay_core::config::AnnouncementPolicy;

/// Role of a turn. Serialized with the chat-completions role names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "system")]
    Directive,
    #[serde(rename = "user")]
    Human,
    #[serde(rename = "assistant")]
    Assistant,
}

/// A single role-tagged entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn directive(content: impl Into<String>) -> Self {
        Self {
            role: Role::Directive,
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("assistant turn without a preceding human turn")]
    NoPendingHuman,
}

/// Ordered turn history: directive prefix followed by human/assistant turns.
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
    /// Number of leading directive-role turns kept by `reset()`.
    prefix_len: usize,
    announcement: AnnouncementPolicy,
}

impl Conversation {
    pub fn new(directive: impl Into<String>) -> Self {
        Self::with_policy(directive, AnnouncementPolicy::default())
    }

    pub fn with_policy(directive: impl Into<String>, announcement: AnnouncementPolicy) -> Self {
        Self {
            turns: vec![Turn::directive(directive)],
            prefix_len: 1,
            announcement,
        }
    }

    /// Append a human turn.
    pub fn append(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::human(text));
    }

    /// Append the assistant reply to the most recent human turn.
    pub fn complete(&mut self, text: impl Into<String>) -> Result<(), ConversationError> {
        match self.turns.last() {
            Some(turn) if turn.role == Role::Human => {
                self.turns.push(Turn::assistant(text));
                Ok(())
            }
            _ => Err(ConversationError::NoPendingHuman),
        }
    }

    /// Replace the directive at position 0, leaving every other turn intact.
    pub fn replace_directive(&mut self, text: impl Into<String>) {
        self.turns[0].content = text.into();
    }

    /// Record a one-time fact about the human (first contact only).
    ///
    /// Under [`AnnouncementPolicy::Append`] a directive-role turn is pushed;
    /// before any human turn it joins the reset prefix. Under
    /// [`AnnouncementPolicy::Merge`] the text is appended to the directive.
    pub fn append_announcement(&mut self, text: impl Into<String>) {
        let text = text.into();
        match self.announcement {
            AnnouncementPolicy::Append => {
                let in_prefix = self.turns.len() == self.prefix_len;
                self.turns.push(Turn::directive(text));
                if in_prefix {
                    self.prefix_len += 1;
                }
            }
            AnnouncementPolicy::Merge => {
                let directive = &mut self.turns[0].content;
                directive.push('\n');
                directive.push_str(&text);
            }
        }
    }

    /// Drop every turn after the directive prefix.
    pub fn reset(&mut self) {
        self.turns.truncate(self.prefix_len);
    }

    /// Content of the active directive.
    pub fn directive(&self) -> &str {
        &self.turns[0].content
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Announcement text for the human's display name.
pub fn name_announcement(name: &str) -> String {
    format!("Remember, human's name is {name}")
}
