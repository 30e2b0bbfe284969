//! Reply delivery.
//!
//! Telegram caps a message at 4096 characters. Longer replies are split on
//! line boundaries, then word boundaries, then hard character boundaries,
//! and sent in order. Splitting counts `char`s so it never cuts a UTF-8
//! sequence.

use tracing::warn;

use relay_core::ChatId;

use crate::error::TransportError;
use crate::transport::MessagingTransport;

/// Maximum characters per Telegram message.
pub const CHUNK_MAX: usize = 4096;

/// Split `text` into pieces of at most `max` characters.
pub fn split_chunks(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max {
        // Byte offset just past the first `max` chars.
        let limit = rest
            .char_indices()
            .nth(max)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..limit];
        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(limit);

        chunks.push(rest[..cut].to_string());
        rest = rest[cut..].trim_start_matches(|c: char| c == '\n' || c == ' ');
    }

    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Send `text` to `chat`, chunked. Stops at the first failed chunk.
pub async fn send_reply(
    transport: &dyn MessagingTransport,
    chat: ChatId,
    text: &str,
) -> Result<(), TransportError> {
    let chunks = split_chunks(text, CHUNK_MAX);
    if chunks.is_empty() {
        warn!(chat_id = chat.0, "refusing to send an empty reply");
        return Ok(());
    }
    for chunk in &chunks {
        transport.send_text(chat, chunk).await?;
    }
    Ok(())
}
