//! Inbound event validation.
//!
//! Deny-by-default: only messages from the single authorized principal, with
//! non-empty text within the length cap, reach the orchestration loop.

use relay_core::{Event, InboundMessage, PrincipalId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("received non-message update")]
    NotAMessage,

    #[error("received unauthorized message from {user_id}")]
    Unauthorized { user_id: PrincipalId },

    #[error("received message without text")]
    EmptyText,

    #[error("received message that is too long ({len} chars, max {max})")]
    TooLong { len: usize, max: usize },
}

/// Check `event` against the authorized principal and the length cap.
///
/// Length is measured in characters, not bytes.
pub fn validate(
    event: &Event,
    admin: PrincipalId,
    max_len: usize,
) -> Result<&InboundMessage, ValidationError> {
    let msg = match event.message.as_ref() {
        Some(m) if m.message_id != 0 => m,
        _ => return Err(ValidationError::NotAMessage),
    };

    if msg.from.id != admin {
        return Err(ValidationError::Unauthorized {
            user_id: msg.from.id,
        });
    }

    if msg.text.is_empty() {
        return Err(ValidationError::EmptyText);
    }

    let len = msg.text.chars().count();
    if len > max_len {
        return Err(ValidationError::TooLong { len, max: max_len });
    }

    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::message_event;

    const ADMIN: PrincipalId = PrincipalId(42);

    #[test]
    fn accepts_admin_message() {
        let ev = message_event(1, 42, "Hello");
        assert_eq!(validate(&ev, ADMIN, 1024).unwrap().text, "Hello");
    }

    #[test]
    fn rejects_missing_or_unidentified_message() {
        let ev = Event {
            update_id: 1,
            message: None,
        };
        assert_eq!(validate(&ev, ADMIN, 1024), Err(ValidationError::NotAMessage));

        let mut ev = message_event(2, 42, "Hello");
        if let Some(m) = ev.message.as_mut() {
            m.message_id = 0;
        }
        assert_eq!(validate(&ev, ADMIN, 1024), Err(ValidationError::NotAMessage));
    }

    #[test]
    fn rejects_other_principals() {
        let ev = message_event(1, 99, "Hello");
        assert_eq!(
            validate(&ev, ADMIN, 1024),
            Err(ValidationError::Unauthorized {
                user_id: PrincipalId(99)
            })
        );
    }

    #[test]
    fn rejects_empty_text() {
        let ev = message_event(1, 42, "");
        assert_eq!(validate(&ev, ADMIN, 1024), Err(ValidationError::EmptyText));
    }

    #[test]
    fn length_cap_is_inclusive_and_counts_chars() {
        let at_cap = message_event(1, 42, &"é".repeat(1024));
        assert!(validate(&at_cap, ADMIN, 1024).is_ok());

        let over = message_event(2, 42, &"a".repeat(1025));
        assert_eq!(
            validate(&over, ADMIN, 1024),
            Err(ValidationError::TooLong { len: 1025, max: 1024 })
        );
    }
}
