//! In-process fakes for the transport and completion backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use relay_agent::{CompletionBackend, ProviderError, Turn};
use relay_core::{
    BotIdentity, ChatId, Event, InboundMessage, PresenceKind, Principal, PrincipalId,
};
use relay_memory::{MemoryError, TranscriptRecorder};

use crate::error::TransportError;
use crate::transport::MessagingTransport;

/// A text message from `user_id` in the private chat with the same id.
pub fn message_event(update_id: i64, user_id: i64, text: &str) -> Event {
    Event {
        update_id,
        message: Some(InboundMessage {
            message_id: update_id + 1000,
            from: Principal {
                id: PrincipalId(user_id),
                first_name: format!("User{user_id}"),
                username: None,
            },
            chat_id: ChatId(user_id),
            text: text.to_string(),
            date: chrono::Utc::now(),
        }),
    }
}

/// Scripted transport. Polls pop the next scripted batch; once the script is
/// empty a poll never completes.
#[derive(Default)]
pub struct FakeTransport {
    polls: Mutex<VecDeque<Result<Vec<Event>, TransportError>>>,
    pub polled_cursors: Mutex<Vec<i64>>,
    pub sent: Mutex<Vec<(ChatId, String)>>,
    presences: AtomicUsize,
    /// Presence calls beyond this many fail.
    presence_budget: Option<usize>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_polls(polls: Vec<Result<Vec<Event>, TransportError>>) -> Self {
        Self {
            polls: Mutex::new(polls.into()),
            ..Self::default()
        }
    }

    pub fn failing_presence_after(successes: usize) -> Self {
        Self {
            presence_budget: Some(successes),
            ..Self::default()
        }
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn presence_count(&self) -> usize {
        self.presences.load(Ordering::SeqCst)
    }

    pub fn cursors(&self) -> Vec<i64> {
        self.polled_cursors.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingTransport for FakeTransport {
    async fn poll(&self, cursor: i64, _wait: Duration) -> Result<Vec<Event>, TransportError> {
        self.polled_cursors.lock().unwrap().push(cursor);
        let next = self.polls.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => std::future::pending().await,
        }
    }

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push((chat, text.to_string()));
        Ok(())
    }

    async fn send_presence(&self, _chat: ChatId, _kind: PresenceKind) -> Result<(), TransportError> {
        let n = self.presences.fetch_add(1, Ordering::SeqCst);
        match self.presence_budget {
            Some(budget) if n >= budget => Err(TransportError::Request("chat action rejected".into())),
            _ => Ok(()),
        }
    }

    async fn identify(&self) -> Result<BotIdentity, TransportError> {
        Ok(BotIdentity {
            id: 1,
            username: "relay_bot".to_string(),
        })
    }
}

/// Backend with a fixed answer, optionally after a delay. Records each history.
pub struct FakeBackend {
    reply: Result<String, String>,
    delay: Option<Duration>,
    pub calls: Mutex<Vec<Vec<Turn>>>,
}

impl FakeBackend {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            reply: Err(reason.to_string()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl CompletionBackend for FakeBackend {
    async fn generate(&self, turns: &[Turn]) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(turns.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().map_err(ProviderError::Unavailable)
    }
}

/// Backend that never answers.
pub struct StalledBackend;

#[async_trait]
impl CompletionBackend for StalledBackend {
    async fn generate(&self, _turns: &[Turn]) -> Result<String, ProviderError> {
        std::future::pending().await
    }
}

/// Recorder that keeps rows in memory, or always fails.
#[derive(Default)]
pub struct FakeRecorder {
    pub rows: Mutex<Vec<(PrincipalId, String, String)>>,
    pub fail: bool,
}

impl TranscriptRecorder for FakeRecorder {
    fn record(
        &self,
        user_id: PrincipalId,
        human_text: &str,
        assistant_text: &str,
    ) -> Result<(), MemoryError> {
        if self.fail {
            return Err(MemoryError::LockPoisoned);
        }
        self.rows
            .lock()
            .unwrap()
            .push((user_id, human_text.to_string(), assistant_text.to_string()));
        Ok(())
    }
}
