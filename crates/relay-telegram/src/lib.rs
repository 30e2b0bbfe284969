//! Telegram side of the relay: transport, update source and the
//! orchestration loop that ties them to the completion backend.

pub mod command;
pub mod error;
pub mod relay;
pub mod send;
pub mod transport;
pub mod updates;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

pub use command::Command;
pub use error::TransportError;
pub use relay::{Outcome, RelayLoop, RelaySettings};
pub use transport::{MessagingTransport, TelegramTransport};
pub use updates::{Backoff, CursorHandle, UpdateSource};
pub use validate::ValidationError;
