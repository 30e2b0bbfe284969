use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

/// Local Ollama server (`/api/chat`). No authentication.
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = build_request_body(req);
        let url = format!("{}/api/chat", self.base_url);

        debug!(model = %req.model, "sending request to Ollama");

        let resp = self.client.post(&url).json(&body).send().await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Ollama API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parse_response(api_resp))
    }
}

fn build_request_body(req: &ChatRequest) -> serde_json::Value {
    // Ollama uses the same messages array format as OpenAI.
    serde_json::json!({
        "model": req.model,
        "messages": req.messages,
        "stream": false,
        "options": {
            "num_predict": req.max_tokens,
        },
    })
}

fn parse_response(resp: ApiResponse) -> ChatResponse {
    let stop_reason = if resp.done {
        resp.done_reason.unwrap_or_else(|| "stop".to_string())
    } else {
        String::new()
    };

    ChatResponse {
        content: resp.message.content,
        model: resp.model,
        tokens_in: resp.prompt_eval_count.unwrap_or(0),
        tokens_out: resp.eval_count.unwrap_or(0),
        stop_reason,
    }
}

// Ollama API response types (private, deserialization only)

#[derive(Deserialize)]
struct ApiResponse {
    model: String,
    message: OllamaMessage,
    done: bool,
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Turn;

    #[test]
    fn request_body_maps_max_tokens_to_num_predict() {
        let req = ChatRequest {
            model: "openhermes".to_string(),
            messages: vec![Turn::directive("Be kind."), Turn::human("Hello")],
            max_tokens: 256,
        };
        let body = build_request_body(&req);
        assert_eq!(body["options"]["num_predict"], 256);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn parses_final_message() {
        let raw = r#"{
            "model": "openhermes",
            "message": {"role": "assistant", "content": "Hi!"},
            "done": true,
            "prompt_eval_count": 20,
            "eval_count": 3
        }"#;
        let resp = parse_response(serde_json::from_str(raw).unwrap());
        assert_eq!(resp.content, "Hi!");
        assert_eq!(resp.stop_reason, "stop");
        assert_eq!(resp.tokens_out, 3);
    }
}
