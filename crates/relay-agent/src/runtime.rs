use async_trait::async_trait;
use tracing::info;

use crate::conversation::Turn;
use crate::provider::{ChatRequest, LlmProvider, ProviderError};

/// The completion backend as seen by the orchestration loop.
///
/// Stateless per call: the caller passes the whole history every time.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn generate(&self, turns: &[Turn]) -> Result<String, ProviderError>;
}

/// Binds an LLM provider to the model and token budget chosen at startup.
pub struct AgentRuntime {
    provider: Box<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
}

impl AgentRuntime {
    pub fn new(provider: Box<dyn LlmProvider>, model: String, max_tokens: u32) -> Self {
        Self {
            provider,
            model,
            max_tokens,
        }
    }

    pub fn provider(&self) -> &dyn LlmProvider {
        &*self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionBackend for AgentRuntime {
    async fn generate(&self, turns: &[Turn]) -> Result<String, ProviderError> {
        let req = ChatRequest {
            model: self.model.clone(),
            messages: turns.to_vec(),
            max_tokens: self.max_tokens,
        };
        let resp = self.provider.send(&req).await?;
        info!(
            provider = %self.provider.name(),
            model = %resp.model,
            tokens_in = resp.tokens_in,
            tokens_out = resp.tokens_out,
            stop_reason = %resp.stop_reason,
            "completion finished"
        );
        Ok(resp.content)
    }
}
