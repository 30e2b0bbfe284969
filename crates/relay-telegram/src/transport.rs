//! Messaging transport seam and its Telegram Bot API implementation.
//!
//! The orchestration loop and update source only see [`MessagingTransport`];
//! `TelegramTransport` maps it onto teloxide requests.

use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, ChatAction, ChatId as TgChatId, UpdateKind};
use tracing::info;

use relay_core::{BotIdentity, ChatId, Event, InboundMessage, PresenceKind, Principal, PrincipalId};

use crate::error::TransportError;

/// Extra time the HTTP client waits beyond the server-side long-poll window.
const POLL_GRACE_SECS: u64 = 10;

/// Request/response primitives of the messaging channel.
#[async_trait]
pub trait MessagingTransport: Send + Sync {
    /// Long-poll for events with `update_id >= cursor`, waiting at most `wait`
    /// server-side. Events come back in increasing `update_id` order.
    async fn poll(&self, cursor: i64, wait: Duration) -> Result<Vec<Event>, TransportError>;

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), TransportError>;

    async fn send_presence(&self, chat: ChatId, kind: PresenceKind) -> Result<(), TransportError>;

    /// Identity of the bot account; used once at startup.
    async fn identify(&self) -> Result<BotIdentity, TransportError>;
}

/// Telegram Bot API over teloxide.
pub struct TelegramTransport {
    bot: Bot,
    debug: bool,
}

impl TelegramTransport {
    /// Build a transport whose HTTP timeout covers a `poll_timeout` long poll.
    pub fn new(token: &str, poll_timeout: Duration, debug: bool) -> Result<Self, TransportError> {
        if token.trim().is_empty() {
            return Err(TransportError::NoToken);
        }
        let client = teloxide::net::default_reqwest_settings()
            .timeout(poll_timeout + Duration::from_secs(POLL_GRACE_SECS))
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            bot: Bot::with_client(token, client),
            debug,
        })
    }
}

#[async_trait]
impl MessagingTransport for TelegramTransport {
    async fn poll(&self, cursor: i64, wait: Duration) -> Result<Vec<Event>, TransportError> {
        if self.debug {
            info!(offset = cursor, timeout_secs = wait.as_secs(), "telegram getUpdates");
        }
        let updates = self
            .bot
            .get_updates()
            .offset(offset_param(cursor)?)
            .timeout(wait.as_secs() as u32)
            .allowed_updates(vec![AllowedUpdate::Message])
            .await?;
        if self.debug {
            info!(count = updates.len(), "telegram getUpdates returned");
        }
        Ok(updates.into_iter().map(event_from_update).collect())
    }

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), TransportError> {
        if self.debug {
            info!(chat_id = chat.0, text, "telegram sendMessage");
        }
        self.bot.send_message(TgChatId(chat.0), text).await?;
        Ok(())
    }

    async fn send_presence(&self, chat: ChatId, kind: PresenceKind) -> Result<(), TransportError> {
        if self.debug {
            info!(chat_id = chat.0, action = %kind, "telegram sendChatAction");
        }
        let action = match kind {
            PresenceKind::Typing => ChatAction::Typing,
        };
        self.bot.send_chat_action(TgChatId(chat.0), action).await?;
        Ok(())
    }

    async fn identify(&self) -> Result<BotIdentity, TransportError> {
        let me = self.bot.get_me().await?;
        Ok(BotIdentity {
            id: me.user.id.0 as i64,
            username: me.user.username.clone().unwrap_or_default(),
        })
    }
}

/// The Bot API takes the offset as a 32-bit integer.
fn offset_param(cursor: i64) -> Result<i32, TransportError> {
    i32::try_from(cursor)
        .map_err(|_| TransportError::Request(format!("update offset {cursor} out of range")))
}

/// Convert a Bot API update into a relay event.
///
/// Anything other than a message with a sender becomes an event without a
/// message, which validation then drops.
fn event_from_update(update: Update) -> Event {
    let update_id = update.id.0 as i64;
    let message = match update.kind {
        UpdateKind::Message(msg) => inbound_from_message(&msg),
        _ => None,
    };
    Event { update_id, message }
}

fn inbound_from_message(msg: &Message) -> Option<InboundMessage> {
    let from = msg.from.as_ref()?;
    Some(InboundMessage {
        message_id: msg.id.0 as i64,
        from: Principal {
            id: PrincipalId(from.id.0 as i64),
            first_name: from.first_name.clone(),
            username: from.username.clone(),
        },
        chat_id: ChatId(msg.chat.id.0),
        text: msg.text().unwrap_or("").to_string(),
        date: msg.date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: &str) -> Update {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn text_message_becomes_event() {
        let ev = event_from_update(update(
            r#"{
                "update_id": 10,
                "message": {
                    "message_id": 5,
                    "date": 1700000000,
                    "chat": {"id": 42, "type": "private", "first_name": "Ada"},
                    "from": {"id": 42, "is_bot": false, "first_name": "Ada", "username": "ada"},
                    "text": "Hi"
                }
            }"#,
        ));

        assert_eq!(ev.update_id, 10);
        let msg = ev.message.unwrap();
        assert_eq!(msg.message_id, 5);
        assert_eq!(msg.from.id, PrincipalId(42));
        assert_eq!(msg.from.username.as_deref(), Some("ada"));
        assert_eq!(msg.chat_id, ChatId(42));
        assert_eq!(msg.text, "Hi");
        assert_eq!(msg.date.timestamp(), 1700000000);
    }

    #[test]
    fn edited_message_has_no_payload() {
        let ev = event_from_update(update(
            r#"{
                "update_id": 11,
                "edited_message": {
                    "message_id": 5,
                    "date": 1700000000,
                    "edit_date": 1700000060,
                    "chat": {"id": 42, "type": "private", "first_name": "Ada"},
                    "from": {"id": 42, "is_bot": false, "first_name": "Ada"},
                    "text": "Hi again"
                }
            }"#,
        ));

        assert_eq!(ev.update_id, 11);
        assert!(ev.message.is_none());
    }

    #[test]
    fn offset_outside_i32_is_an_error() {
        assert_eq!(offset_param(0).unwrap(), 0);
        assert_eq!(offset_param(i32::MAX as i64).unwrap(), i32::MAX);
        assert!(matches!(
            offset_param(i32::MAX as i64 + 1),
            Err(TransportError::Request(_))
        ));
        assert!(offset_param(i64::MIN).is_err());
    }

    #[test]
    fn empty_token_is_rejected() {
        assert!(matches!(
            TelegramTransport::new("  ", Duration::from_secs(60), false),
            Err(TransportError::NoToken)
        ));
    }
}
