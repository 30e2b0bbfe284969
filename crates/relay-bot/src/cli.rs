//! Command-line flags. Every flag overrides the matching config file value.

use clap::Parser;

use relay_core::config::Engine;
use relay_core::RelayConfig;

/// Single-user Telegram relay to a chat completion backend.
#[derive(Parser, Debug)]
#[command(name = "relay-bot")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("RELAY_GIT_SHA"), ")"))]
#[command(about, long_about = None)]
pub struct Cli {
    /// Path to relay.toml (default ~/.relay/relay.toml)
    #[arg(long, env = "RELAY_CONFIG", value_name = "PATH")]
    pub config: Option<String>,

    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: Option<String>,

    /// Telegram user id of the only principal the bot answers
    #[arg(long, env = "TELEGRAM_USER_ID")]
    pub telegram_user_id: Option<i64>,

    /// Log Bot API traffic
    #[arg(long)]
    pub telegram_debug: bool,

    /// Completion engine: openai or ollama
    #[arg(long, value_name = "ENGINE")]
    pub llm_engine: Option<Engine>,

    /// Initial directive for the assistant
    #[arg(long, env = "SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,

    /// Ollama model, see https://ollama.ai/library
    #[arg(long)]
    pub ollama_model: Option<String>,

    #[arg(long, value_name = "URL")]
    pub ollama_url: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long)]
    pub openai_model: Option<String>,

    /// Log OpenAI request and response bodies
    #[arg(long)]
    pub openai_debug: bool,

    /// Record transcripts and the update cursor in SQLite
    #[arg(long)]
    pub database_enabled: bool,

    #[arg(long, value_name = "PATH")]
    pub database_path: Option<String>,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut RelayConfig) {
        if let Some(token) = &self.telegram_bot_token {
            config.telegram.bot_token = token.clone();
        }
        if let Some(id) = self.telegram_user_id {
            config.telegram.admin_id = Some(id);
        }
        config.telegram.debug |= self.telegram_debug;

        if let Some(engine) = self.llm_engine {
            config.agent.engine = engine;
        }
        if let Some(prompt) = &self.system_prompt {
            config.agent.system_prompt = prompt.clone();
        }

        if let Some(model) = &self.ollama_model {
            config.providers.ollama.model = model.clone();
        }
        if let Some(url) = &self.ollama_url {
            config.providers.ollama.base_url = url.clone();
        }
        if let Some(key) = &self.openai_api_key {
            config.providers.openai.api_key = key.clone();
        }
        if let Some(model) = &self.openai_model {
            config.providers.openai.model = model.clone();
        }
        config.providers.openai.debug |= self.openai_debug;

        config.database.enabled |= self.database_enabled;
        if let Some(path) = &self.database_path {
            config.database.path = path.clone();
        }
    }
}
