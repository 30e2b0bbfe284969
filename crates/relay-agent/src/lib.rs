//! Completion backend side of the relay: chat providers and conversation state.

pub mod conversation;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod runtime;

pub use conversation::{Conversation, ConversationError, Role, Turn};
pub use provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
pub use runtime::{AgentRuntime, CompletionBackend};
