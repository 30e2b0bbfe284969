use thiserror::Error;

/// Errors that surface to the host process.
///
/// Only startup failures are fatal; per-event failures are logged by the
/// orchestration loop and never reach this type.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Startup failed: {0}")]
    Startup(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl RelayError {
    /// Short machine-readable code used in structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Config(_) => "CONFIG_ERROR",
            RelayError::Startup(_) => "STARTUP_ERROR",
            RelayError::Transport(_) => "TRANSPORT_ERROR",
            RelayError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
