//! Orchestration loop: one event at a time from the update source to a reply.
//!
//! For every event:
//! 1. Validation (authorized principal, text present, length cap)
//! 2. First-contact announcement of the principal's name
//! 3. Command interception (`/start`, `/reset`, `/system`)
//! 4. Conversational turn: typing presence, completion in a spawned task,
//!    periodic presence keepalive, reply or fallback
//!
//! Events are handled strictly sequentially; the conversation has a single
//! owner and needs no locking.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::task::JoinError;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use relay_agent::conversation::name_announcement;
use relay_agent::{CompletionBackend, Conversation, ProviderError};
use relay_core::config::LoopConfig;
use relay_core::{ChatId, Event, InboundMessage, PresenceKind, PrincipalId};
use relay_memory::TranscriptRecorder;

use crate::command::{is_command, Command};
use crate::error::TransportError;
use crate::send::send_reply;
use crate::transport::MessagingTransport;
use crate::validate::{validate, ValidationError};

pub const RESET_ACK: &str = "Chat history reset";
pub const DIRECTIVE_ACK: &str = "System prompt changed";
pub const UNKNOWN_COMMAND: &str = "Unknown command";
pub const FALLBACK_REPLY: &str = "Sorry, assistant is unavailable right now. Try later";

/// Per-loop knobs resolved from configuration.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub admin: PrincipalId,
    pub max_message_len: usize,
    pub typing_interval: Duration,
}

impl RelaySettings {
    pub fn from_config(admin: PrincipalId, config: &LoopConfig) -> Self {
        Self {
            admin,
            max_message_len: config.max_message_len,
            typing_interval: Duration::from_secs(config.typing_interval_secs),
        }
    }
}

/// What happened to a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Failed validation; nothing was sent and no state changed.
    Dropped(ValidationError),
    /// A control command was handled.
    Command(Command),
    /// The completion was appended and relayed.
    Replied,
    /// The turn failed and the fallback reply was sent.
    FellBack,
    /// Cancellation fired while waiting for the completion.
    Abandoned,
    /// The initial presence signal failed; the turn never started.
    Aborted,
}

impl Outcome {
    /// Whether `run` logs this outcome. Drops are already warned about.
    fn traced(&self) -> bool {
        !matches!(self, Outcome::Dropped(_))
    }
}

#[derive(Debug, thiserror::Error)]
enum TurnError {
    #[error("completion failed: {0}")]
    Backend(#[from] ProviderError),

    #[error("completion task failed: {0}")]
    Join(#[from] JoinError),

    #[error("typing keepalive failed: {0}")]
    Presence(#[from] TransportError),
}

/// Sequential relay between the messaging transport and the completion
/// backend for the single authorized principal.
pub struct RelayLoop {
    transport: Arc<dyn MessagingTransport>,
    backend: Arc<dyn CompletionBackend>,
    recorder: Option<Arc<dyn TranscriptRecorder>>,
    conversation: Conversation,
    settings: RelaySettings,
    cancel: CancellationToken,
    greeted: bool,
}

impl RelayLoop {
    pub fn new(
        transport: Arc<dyn MessagingTransport>,
        backend: Arc<dyn CompletionBackend>,
        conversation: Conversation,
        settings: RelaySettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            backend,
            recorder: None,
            conversation,
            settings,
            cancel,
            greeted: false,
        }
    }

    /// Record every completed turn with `recorder`.
    pub fn with_recorder(mut self, recorder: Arc<dyn TranscriptRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Handle events until the stream ends or cancellation fires.
    pub async fn run<S>(&mut self, events: S)
    where
        S: Stream<Item = Event>,
    {
        tokio::pin!(events);
        while let Some(event) = events.next().await {
            if self.cancel.is_cancelled() {
                break;
            }
            let update_id = event.update_id;
            let outcome = self.handle_event(event).await;
            if outcome.traced() {
                debug!(update_id, ?outcome, "update handled");
            }
        }
        info!("relay loop stopped");
    }

    /// Handle a single event to completion.
    pub async fn handle_event(&mut self, event: Event) -> Outcome {
        // 1. Deny-by-default validation. Dropped events never touch state.
        let msg = match validate(&event, self.settings.admin, self.settings.max_message_len) {
            Ok(msg) => msg.clone(),
            Err(e) => {
                warn!(update_id = event.update_id, error = %e, "invalid update received");
                return Outcome::Dropped(e);
            }
        };

        // 2. First contact: tell the backend who it is talking to.
        if !self.greeted {
            self.greeted = true;
            let name = msg.from.display_name();
            if !name.is_empty() {
                self.conversation.append_announcement(name_announcement(name));
            }
        }

        // 3. Commands never reach the backend.
        if is_command(&msg.text) {
            let command = Command::parse(&msg.text);
            self.handle_command(&msg, &command).await;
            return Outcome::Command(command);
        }

        // 4. Conversational turn.
        self.converse(&msg).await
    }

    async fn handle_command(&mut self, msg: &InboundMessage, command: &Command) {
        let reply = match command {
            Command::Start => return,
            Command::Reset => {
                self.conversation.reset();
                RESET_ACK.to_string()
            }
            Command::SetDirective(text) => {
                self.conversation.replace_directive(text.as_str());
                DIRECTIVE_ACK.to_string()
            }
            Command::ShowDirective => self.conversation.directive().to_string(),
            Command::Unknown(name) => {
                debug!(command = %name, "unknown command");
                UNKNOWN_COMMAND.to_string()
            }
        };
        self.reply(msg.chat_id, &reply).await;
    }

    async fn converse(&mut self, msg: &InboundMessage) -> Outcome {
        let chat = msg.chat_id;

        if let Err(e) = self.transport.send_presence(chat, PresenceKind::Typing).await {
            error!(chat_id = chat.0, error = %e, "failed to send typing action");
            return Outcome::Aborted;
        }

        self.conversation.append(msg.text.as_str());

        let reply = match self.await_completion(chat).await {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                info!(chat_id = chat.0, "turn abandoned on shutdown");
                return Outcome::Abandoned;
            }
            Err(e) => {
                error!(chat_id = chat.0, error = %e, "failed to get completion");
                self.reply(chat, FALLBACK_REPLY).await;
                return Outcome::FellBack;
            }
        };

        if let Err(e) = self.conversation.complete(reply.as_str()) {
            error!(chat_id = chat.0, error = %e, "failed to append completion");
        }
        self.reply(chat, &reply).await;

        if let Some(recorder) = &self.recorder {
            if let Err(e) = recorder.record(msg.from.id, &msg.text, &reply) {
                warn!(user_id = %msg.from.id, error = %e, "failed to record transcript");
            }
        }
        Outcome::Replied
    }

    /// Run the completion in its own task and keep the typing indicator
    /// alive until it returns.
    ///
    /// `Ok(None)` means cancellation won. The completion task is detached, not
    /// aborted, when the turn ends early; its result is simply discarded.
    async fn await_completion(&self, chat: ChatId) -> Result<Option<String>, TurnError> {
        let backend = Arc::clone(&self.backend);
        let turns = self.conversation.turns().to_vec();
        let mut task = tokio::spawn(async move { backend.generate(&turns).await });

        let period = self.settings.typing_interval;
        let mut keepalive = interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(None),
                joined = &mut task => return Ok(Some(joined??)),
                _ = keepalive.tick() => {
                    self.transport
                        .send_presence(chat, PresenceKind::Typing)
                        .await?;
                }
            }
        }
    }

    /// Send `text`; failures are logged and never retried.
    async fn reply(&self, chat: ChatId, text: &str) {
        if let Err(e) = send_reply(self.transport.as_ref(), chat, text).await {
            error!(chat_id = chat.0, error = %e, "failed to send message");
        }
    }
}
