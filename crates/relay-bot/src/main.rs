use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use relay_agent::ollama::OllamaProvider;
use relay_agent::openai::OpenAiProvider;
use relay_agent::{AgentRuntime, Conversation};
use relay_core::config::Engine;
use relay_core::{PrincipalId, RelayConfig, RelayError};
use relay_memory::TranscriptStore;
use relay_telegram::{
    CursorHandle, MessagingTransport, RelayLoop, RelaySettings, TelegramTransport, UpdateSource,
};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "relay_bot=info,relay_telegram=info,relay_agent=info".into()
            }),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("RELAY_GIT_SHA"),
        "starting relay-bot"
    );

    let cli = cli::Cli::parse();
    if let Err(e) = run(&cli).await {
        error!(code = e.code(), error = %e, "relay-bot exited with error");
        return Err(e.into());
    }
    Ok(())
}

async fn run(cli: &cli::Cli) -> relay_core::Result<()> {
    // config: relay.toml < RELAY_* env < command-line flags
    let mut config = RelayConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;
    let admin = config
        .telegram
        .admin_id
        .map(PrincipalId)
        .ok_or_else(|| RelayError::Config("telegram.admin_id is not set".into()))?;

    let runtime = build_runtime(&config);
    info!(
        provider = runtime.provider().name(),
        model = runtime.model(),
        "completion backend ready"
    );

    let transport: Arc<dyn MessagingTransport> = Arc::new(
        TelegramTransport::new(
            &config.telegram.bot_token,
            Duration::from_secs(config.relay.poll_timeout_secs),
            config.telegram.debug,
        )
        .map_err(|e| RelayError::Transport(e.to_string()))?,
    );
    let me = transport
        .identify()
        .await
        .map_err(|e| RelayError::Startup(format!("failed to identify the bot account: {e}")))?;
    info!(username = %me.username, id = me.id, "authorized on account");

    let store = if config.database.enabled {
        Some(Arc::new(open_store(&config.database.path)?))
    } else {
        None
    };
    let offset = match &store {
        Some(store) => store.load_cursor().map_err(storage)?.unwrap_or(0),
        None => 0,
    };

    let cancel = CancellationToken::new();
    let cursor = CursorHandle::new(offset);
    let source = UpdateSource::new(Arc::clone(&transport), cursor.clone(), &config.relay);

    let conversation =
        Conversation::with_policy(config.agent.directive(), config.agent.announcement);
    let mut relay = RelayLoop::new(
        transport,
        Arc::new(runtime),
        conversation,
        RelaySettings::from_config(admin, &config.relay),
        cancel.clone(),
    );
    if let Some(store) = &store {
        relay = relay.with_recorder(store.clone());
    }

    info!(admin = %admin, offset, "relay started");
    let events = source.into_stream(cancel.clone());
    let worker = tokio::spawn(async move { relay.run(events).await });

    shutdown_signal().await;
    cancel.cancel();
    if let Err(e) = worker.await {
        error!(error = %e, "relay loop panicked");
    }

    if let Some(store) = &store {
        let offset = cursor.get();
        store.save_cursor(offset).map_err(storage)?;
        info!(offset, "update cursor saved");
    }
    info!("relay stopped");
    Ok(())
}

/// Build the completion backend for the configured engine.
fn build_runtime(config: &RelayConfig) -> AgentRuntime {
    let max_tokens = config.agent.max_tokens;
    match config.agent.engine {
        Engine::OpenAi => {
            let openai = &config.providers.openai;
            info!(base_url = %openai.base_url, "LLM engine: OpenAI");
            let provider = OpenAiProvider::new(openai.api_key.clone(), Some(openai.base_url.clone()))
                .with_debug(openai.debug);
            AgentRuntime::new(Box::new(provider), openai.model.clone(), max_tokens)
        }
        Engine::Ollama => {
            let ollama = &config.providers.ollama;
            info!(base_url = %ollama.base_url, "LLM engine: Ollama");
            let provider = OllamaProvider::new(Some(ollama.base_url.clone()));
            AgentRuntime::new(Box::new(provider), ollama.model.clone(), max_tokens)
        }
    }
}

/// Open the SQLite database and run the (idempotent) schema setup.
fn open_store(path: &str) -> relay_core::Result<TranscriptStore> {
    ensure_parent_dir(path);
    info!(path = %path, "opening SQLite database");

    let db = rusqlite::Connection::open(path)
        .map_err(|e| RelayError::Storage(format!("failed to open {path}: {e}")))?;
    db.execute_batch("PRAGMA journal_mode=WAL;").map_err(storage)?;
    relay_memory::db::init_db(&db).map_err(storage)?;
    Ok(TranscriptStore::new(db))
}

fn storage(e: impl std::fmt::Display) -> RelayError {
    RelayError::Storage(e.to_string())
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
