/// Errors produced by the messaging transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("teloxide error: {0}")]
    Teloxide(#[from] teloxide::RequestError),

    #[error("request failed: {0}")]
    Request(String),

    #[error("no bot token configured")]
    NoToken,
}
