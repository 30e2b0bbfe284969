use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Server-side long-poll wait, in seconds.
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 60;
/// Telegram's typing status expires after ~5 seconds, so it is refreshed every 4.
pub const DEFAULT_TYPING_INTERVAL_SECS: u64 = 4;
/// Longest inbound text accepted from the principal.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 1024;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 500;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI assistant with a flair for friendliness and just a sprinkle of sass. \
You are helpful and kind.\n\
Remember, your responses are crafted to be concise, \
maintaining a balance between warmth, professionalism, and efficiency.\n";

/// Top-level config (relay.toml + RELAY_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub relay: LoopConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// The single principal allowed to talk to the bot.
    pub admin_id: Option<i64>,
    /// Log raw request/response traffic with the Bot API.
    #[serde(default)]
    pub debug: bool,
}

/// Which completion backend serves conversational turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    OpenAi,
    Ollama,
}

impl std::str::FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Engine::OpenAi),
            "ollama" => Ok(Engine::Ollama),
            other => Err(format!("unknown LLM engine {other}")),
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Engine::OpenAi => write!(f, "openai"),
            Engine::Ollama => write!(f, "ollama"),
        }
    }
}

/// How the first-contact "human's name" fact enters the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementPolicy {
    /// Push a second directive-role turn after the directive.
    #[default]
    Append,
    /// Append the sentence to the directive text itself.
    Merge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub engine: Engine,
    /// Initial directive. Empty means [`DEFAULT_SYSTEM_PROMPT`].
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub announcement: AnnouncementPolicy,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            engine: Engine::default(),
            system_prompt: String::new(),
            announcement: AnnouncementPolicy::default(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl AgentConfig {
    pub fn directive(&self) -> &str {
        if self.system_prompt.trim().is_empty() {
            DEFAULT_SYSTEM_PROMPT
        } else {
            &self.system_prompt
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: OpenAiProviderConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    /// Log full request and response bodies.
    #[serde(default)]
    pub debug: bool,
}

impl Default for OpenAiProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Record transcripts and the polling cursor in SQLite.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_db_path(),
        }
    }
}

/// Timing and limits of the orchestration loop and update source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_typing_interval")]
    pub typing_interval_secs: u64,
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
            typing_interval_secs: DEFAULT_TYPING_INTERVAL_SECS,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
        }
    }
}

fn default_max_tokens() -> u32 {
    1024
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_openai_model() -> String {
    "gpt-4-1106-preview".to_string()
}
fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_ollama_model() -> String {
    "openhermes".to_string()
}
fn default_poll_timeout() -> u64 {
    DEFAULT_POLL_TIMEOUT_SECS
}
fn default_typing_interval() -> u64 {
    DEFAULT_TYPING_INTERVAL_SECS
}
fn default_max_message_len() -> usize {
    DEFAULT_MAX_MESSAGE_LEN
}
fn default_backoff_base() -> u64 {
    DEFAULT_BACKOFF_BASE_MS
}
fn default_backoff_max() -> u64 {
    DEFAULT_BACKOFF_MAX_MS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.relay/relay.db", home)
}

impl RelayConfig {
    /// Load config from a TOML file with RELAY_* env var overrides.
    ///
    /// Nested keys use a double underscore: `RELAY_TELEGRAM__ADMIN_ID=42`.
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Figment::from(Serialized::defaults(RelayConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("RELAY_").split("__"))
            .extract()
            .map_err(|e| RelayError::Config(e.to_string()))
    }

    /// Reject configurations the relay cannot start with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(RelayError::Config("telegram.bot_token is not set".into()));
        }
        if self.telegram.admin_id.is_none() {
            return Err(RelayError::Config("telegram.admin_id is not set".into()));
        }
        if self.agent.engine == Engine::OpenAi && self.providers.openai.api_key.trim().is_empty() {
            return Err(RelayError::Config(
                "providers.openai.api_key is required for the openai engine".into(),
            ));
        }
        if self.relay.typing_interval_secs == 0 {
            return Err(RelayError::Config(
                "relay.typing_interval_secs must be positive".into(),
            ));
        }
        if self.relay.backoff_base_ms == 0 || self.relay.backoff_base_ms > self.relay.backoff_max_ms
        {
            return Err(RelayError::Config(
                "relay.backoff_base_ms must be positive and not exceed backoff_max_ms".into(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.relay/relay.toml", home)
}
